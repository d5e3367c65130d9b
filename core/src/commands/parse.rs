use anyhow::{bail, Context, Result};

use super::{Command, SendTarget};
use crate::client::EntryPoint;
use crate::display;
use crate::view::SendAction;

impl Command {
    /// Parse a command from a raw input string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("No command entered. Type 'help' for a list of commands.");
        }

        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (input.to_lowercase(), ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match cmd.as_str() {
            "connect" | "login" => Ok(Command::Connect),

            "disconnect" | "logout" => Ok(Command::Disconnect),

            "toggle" => Ok(Command::Toggle),

            "status" | "st" => Ok(Command::Status),

            "select" | "file" => {
                // Paths may contain spaces; take the remainder verbatim.
                if rest.is_empty() {
                    bail!("Missing path. Usage: select <path.wasm>");
                }
                Ok(Command::Select {
                    path: rest.into(),
                })
            }

            "upload" | "deploy" => Ok(Command::Upload),

            "init" | "instantiate" => {
                let id_str = args
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("Missing code id. Usage: init <code_id>"))?;
                let code_id = id_str
                    .parse::<u64>()
                    .with_context(|| format!("Invalid code id '{id_str}'"))?;
                Ok(Command::Init { code_id })
            }

            "amount" | "amt" => {
                let amount_str = args
                    .first()
                    .ok_or_else(|| anyhow::anyhow!("Missing amount. Usage: amount <n>"))?;
                let amount = display::parse_amount(amount_str)
                    .map_err(|e| anyhow::anyhow!("Invalid amount '{amount_str}': {e}"))?;
                Ok(Command::Amount { amount })
            }

            "send" => {
                let target_str = args.first().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Missing denom. Usage: send <juno|usdc|denom> [amount] [route|route_with_sender]"
                    )
                })?;
                let target = match target_str.parse::<SendAction>() {
                    Ok(action) => SendTarget::Preset(action),
                    Err(_) => SendTarget::Denom(target_str.to_string()),
                };

                // [amount] and [entry_point] may appear in either order.
                let mut amount = None;
                let mut entry_point = None;
                for arg in args.iter().skip(1) {
                    if let Ok(ep) = arg.parse::<EntryPoint>() {
                        if entry_point.replace(ep).is_some() {
                            bail!("Entry point given twice.");
                        }
                        continue;
                    }
                    let value = display::parse_amount(arg)
                        .map_err(|e| anyhow::anyhow!("Invalid amount '{arg}': {e}"))?;
                    if value == 0 {
                        bail!("Cannot send 0 {target}.");
                    }
                    if amount.replace(value).is_some() {
                        bail!("Amount given twice.");
                    }
                }

                if matches!(target, SendTarget::Denom(_)) && amount.is_none() {
                    bail!("Missing amount. A custom denom needs an explicit amount: send <denom> <amount>");
                }

                Ok(Command::Send {
                    target,
                    amount,
                    entry_point,
                })
            }

            "help" | "h" | "?" => Ok(Command::Help {
                command: args.first().map(|s| s.to_lowercase()),
            }),

            "exit" | "quit" | "q" => Ok(Command::Exit),

            other => bail!("Unknown command: '{other}'. Type 'help' for a list of commands."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parse_connect() {
        assert_eq!(Command::parse("connect").unwrap(), Command::Connect);
        assert_eq!(Command::parse("disconnect").unwrap(), Command::Disconnect);
        assert_eq!(Command::parse("toggle").unwrap(), Command::Toggle);
    }

    #[test]
    fn parse_status_alias() {
        assert_eq!(Command::parse("st").unwrap(), Command::Status);
        assert_eq!(Command::parse("status").unwrap(), Command::Status);
    }

    #[test]
    fn parse_select() {
        let cmd = Command::parse("select ./artifacts/router.wasm").unwrap();
        assert_eq!(
            cmd,
            Command::Select {
                path: PathBuf::from("./artifacts/router.wasm")
            }
        );
    }

    #[test]
    fn parse_select_path_with_spaces() {
        let cmd = Command::parse("file  /tmp/my contracts/a.wasm ").unwrap();
        assert_eq!(
            cmd,
            Command::Select {
                path: PathBuf::from("/tmp/my contracts/a.wasm")
            }
        );
    }

    #[test]
    fn parse_select_missing_path() {
        assert!(Command::parse("select").is_err());
    }

    #[test]
    fn parse_upload_alias() {
        assert_eq!(Command::parse("deploy").unwrap(), Command::Upload);
    }

    #[test]
    fn parse_init() {
        assert_eq!(
            Command::parse("init 1").unwrap(),
            Command::Init { code_id: 1 }
        );
        assert!(Command::parse("init").is_err());
        assert!(Command::parse("init abc").is_err());
        assert!(Command::parse("init -3").is_err());
    }

    #[test]
    fn parse_amount() {
        assert_eq!(
            Command::parse("amount 250000").unwrap(),
            Command::Amount { amount: 250_000 }
        );
        assert_eq!(
            Command::parse("amount 0").unwrap(),
            Command::Amount { amount: 0 }
        );
        assert!(Command::parse("amount").is_err());
        assert!(Command::parse("amount 1.5").is_err());
    }

    #[test]
    fn parse_send_preset() {
        let cmd = Command::parse("send juno").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                target: SendTarget::Preset(SendAction::Juno),
                amount: None,
                entry_point: None,
            }
        );
    }

    #[test]
    fn parse_send_with_amount_and_entry_point() {
        let cmd = Command::parse("send usdc 1000 route").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                target: SendTarget::Preset(SendAction::Usdc),
                amount: Some(1000),
                entry_point: Some(EntryPoint::Route),
            }
        );

        let cmd = Command::parse("send juno route_with_sender 7").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                target: SendTarget::Preset(SendAction::Juno),
                amount: Some(7),
                entry_point: Some(EntryPoint::RouteWithSender),
            }
        );
    }

    #[test]
    fn parse_send_custom_denom() {
        let cmd = Command::parse("send ujunox 500").unwrap();
        assert_eq!(
            cmd,
            Command::Send {
                target: SendTarget::Denom("ujunox".into()),
                amount: Some(500),
                entry_point: None,
            }
        );
    }

    #[test]
    fn parse_send_custom_denom_needs_amount() {
        assert!(Command::parse("send ujunox").is_err());
    }

    #[test]
    fn parse_send_rejects_zero_and_duplicates() {
        assert!(Command::parse("send juno 0").is_err());
        assert!(Command::parse("send juno 1 2").is_err());
        assert!(Command::parse("send juno route route").is_err());
        assert!(Command::parse("send juno lots").is_err());
        assert!(Command::parse("send").is_err());
    }

    #[test]
    fn parse_help() {
        assert_eq!(
            Command::parse("help").unwrap(),
            Command::Help { command: None }
        );
        assert_eq!(
            Command::parse("help SEND").unwrap(),
            Command::Help {
                command: Some("send".into())
            }
        );
    }

    #[test]
    fn parse_exit() {
        assert_eq!(Command::parse("exit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("quit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("q").unwrap(), Command::Exit);
    }

    #[test]
    fn parse_unknown_command() {
        let err = Command::parse("withdraw").unwrap_err();
        assert!(err.to_string().contains("Unknown command"));
    }

    #[test]
    fn parse_empty_input() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("   ").is_err());
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!(Command::parse("UPLOAD").unwrap(), Command::Upload);
        assert_eq!(Command::parse("Connect").unwrap(), Command::Connect);
    }
}
