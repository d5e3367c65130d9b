use crate::Cli;
/// REPL shell: Reedline-based interactive deployer session.
use anyhow::Result;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use wasmdeploy_core::commands::Command;
use wasmdeploy_core::config::ChainConfig;
use wasmdeploy_core::display;
use wasmdeploy_core::error::DeployError;
use wasmdeploy_core::view::ContractView;

const HISTORY_SIZE: usize = 500;

pub async fn run_repl(cli: &Cli, config: &ChainConfig) -> Result<()> {
    println!("wasmdeploy v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Network: {} ({}) via {}",
        config.network, config.chain_id, config.rest_url
    );
    println!("Gas price: {}  Label: {}", config.gas_price, config.label);
    println!();

    let view = cli.build_view(config);

    println!("Type 'connect' to connect the wallet, 'help' for a list of commands.");
    println!();

    let commands: Vec<String> = vec![
        "connect".into(),
        "login".into(),
        "disconnect".into(),
        "logout".into(),
        "toggle".into(),
        "status".into(),
        "st".into(),
        "select".into(),
        "file".into(),
        "upload".into(),
        "deploy".into(),
        "init".into(),
        "instantiate".into(),
        "amount".into(),
        "amt".into(),
        "send".into(),
        "juno".into(),
        "usdc".into(),
        "route".into(),
        "route_with_sender".into(),
        "help".into(),
        "exit".into(),
        "quit".into(),
        "q".into(),
    ];
    let completer = Box::new(DefaultCompleter::new(commands));
    let mut line_editor = Reedline::create().with_completer(completer);
    match history() {
        Ok(history) => line_editor = line_editor.with_history(history),
        Err(e) => tracing::warn!("REPL history disabled: {e:#}"),
    }

    loop {
        let prompt = prompt(&view);
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match Command::parse(line) {
                    Ok(Command::Exit) => {
                        println!("Goodbye.");
                        break;
                    }
                    Ok(cmd) => {
                        if let Some(prompt_msg) = cmd.confirmation_prompt() {
                            if !prompt_confirm(&prompt_msg) {
                                println!("Cancelled.");
                                continue;
                            }
                        }
                        match cmd.execute(&view, cli.json).await {
                            Ok(output) => {
                                if !output.is_empty() {
                                    println!("{output}");
                                }
                            }
                            Err(e) => match e.downcast_ref::<DeployError>() {
                                // Missing-step hints already say what to do.
                                Some(err) if err.is_precondition() => eprintln!("{err}"),
                                _ => eprintln!("Error: {e}"),
                            },
                        }
                    }
                    Err(e) => {
                        eprintln!("{e}");
                    }
                }
            }
            Ok(Signal::CtrlD) | Ok(Signal::CtrlC) => {
                println!("Goodbye.");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }
    }

    view.session().shutdown();
    Ok(())
}

/// Prompt mirrors the connect control: nickname when connected.
fn prompt(view: &ContractView) -> DefaultPrompt {
    let status = view.status();
    let label = if status.connected {
        display::connect_label(&status)
    } else {
        "disconnected".to_string()
    };
    DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!("[{} {label}]", view.session().chain_id())),
        DefaultPromptSegment::Empty,
    )
}

fn history() -> Result<Box<FileBackedHistory>> {
    let dir = wasmdeploy_core::data_dir()?;
    std::fs::create_dir_all(&dir)?;
    let history = FileBackedHistory::with_file(HISTORY_SIZE, dir.join("history.txt"))?;
    Ok(Box::new(history))
}

fn prompt_confirm(prompt: &str) -> bool {
    use std::io::Write;
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush().ok();
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).is_ok() && input.trim().eq_ignore_ascii_case("y")
}
