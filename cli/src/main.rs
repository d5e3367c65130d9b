mod repl;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wasmdeploy_core::client::FeeMode;
use wasmdeploy_core::commands::Command;
use wasmdeploy_core::config::{ChainConfig, GasPrice, Network};
use wasmdeploy_core::session::{RestConnector, SessionProvider};
use wasmdeploy_core::view::ContractView;
use wasmdeploy_core::wallet::{BridgeWallet, WalletExtension};

#[derive(Parser)]
#[command(
    name = "wasmdeploy",
    about = "Upload, instantiate and call CosmWasm contracts through a browser wallet",
    version
)]
pub(crate) struct Cli {
    /// Run commands and exit (separate several with ';')
    #[arg(long)]
    cmd: Option<String>,

    /// Use testnet (default)
    #[arg(long)]
    testnet: bool,

    /// Use mainnet
    #[arg(long)]
    mainnet: bool,

    /// Use a local node on localhost:1317
    #[arg(long)]
    local: bool,

    /// Custom REST (LCD) endpoint; requires --chain-id
    #[arg(long)]
    rest: Option<String>,

    /// Chain id (overrides the preset's)
    #[arg(long)]
    chain_id: Option<String>,

    /// Gas price, e.g. 0.025ujunox (overrides the preset's)
    #[arg(long)]
    gas_price: Option<GasPrice>,

    /// Multiplier applied to simulated gas
    #[arg(long)]
    gas_adjustment: Option<f64>,

    /// Fixed gas limit per transaction instead of simulating
    #[arg(long)]
    gas: Option<u64>,

    /// Label for instantiated contracts
    #[arg(long)]
    label: Option<String>,

    /// Wallet bridge address
    #[arg(long, env = "WASMDEPLOY_BRIDGE", default_value = "127.0.0.1:7878")]
    bridge: String,

    /// Seconds to wait for the wallet to answer (approvals included)
    #[arg(long, default_value_t = 300)]
    wallet_timeout: u64,

    /// Output in JSON format (useful with --cmd)
    #[arg(long)]
    json: bool,

    /// Allow connecting to non-HTTPS REST endpoints
    #[arg(long)]
    insecure: bool,

    /// Log operations to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn network(&self) -> Network {
        if self.rest.is_some() {
            Network::Custom
        } else if self.mainnet {
            Network::Mainnet
        } else if self.local {
            Network::Local
        } else {
            Network::Testnet
        }
    }

    /// Validate that at most one network flag is set.
    fn validate_network_flags(&self) -> Result<()> {
        let count = self.testnet as u8
            + self.mainnet as u8
            + self.local as u8
            + self.rest.is_some() as u8;
        if count > 1 {
            bail!(
                "Conflicting network flags. Use only one of --testnet, --mainnet, --local, or --rest."
            );
        }
        Ok(())
    }

    fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.rest {
            Some(url) => {
                let chain_id = self
                    .chain_id
                    .as_deref()
                    .context("--rest requires --chain-id")?;
                ChainConfig::custom(url, chain_id, self.insecure)?
            }
            None => {
                let mut config = ChainConfig::preset(self.network())?;
                if let Some(chain_id) = &self.chain_id {
                    config.chain_id = chain_id.clone();
                }
                config
            }
        };
        if let Some(price) = &self.gas_price {
            config.gas_price = price.clone();
        }
        if let Some(adjustment) = self.gas_adjustment {
            if !adjustment.is_finite() || adjustment < 1.0 {
                bail!("--gas-adjustment must be at least 1.0");
            }
            config.gas_adjustment = adjustment;
        }
        if self.gas == Some(0) {
            bail!("--gas must be greater than 0");
        }
        if self.wallet_timeout == 0 {
            bail!("--wallet-timeout must be greater than 0");
        }
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                bail!("--label cannot be empty");
            }
            config.label = label.clone();
        }
        Ok(config)
    }

    fn fee_mode(&self, config: &ChainConfig) -> FeeMode {
        match self.gas {
            Some(gas) => FeeMode::fixed_gas(gas, &config.gas_price),
            None => FeeMode::Auto,
        }
    }

    /// Build the wallet session and the view on top of it. Must run inside
    /// the tokio runtime; the session subscribes to wallet events.
    fn build_view(&self, config: &ChainConfig) -> ContractView {
        let bridge = BridgeWallet::new(self.bridge.clone())
            .with_timeout(Duration::from_secs(self.wallet_timeout));
        let wallet: Arc<dyn WalletExtension> = Arc::new(bridge);
        let connector = Arc::new(RestConnector::new(config.clone(), wallet.clone()));
        let session = SessionProvider::start(wallet, connector, config.chain_id.clone());
        ContractView::new(session)
            .with_label(config.label.clone())
            .with_fee(self.fee_mode(config))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.validate_network_flags()?;
    let config = cli.chain_config()?;

    if let Some(cmd_str) = &cli.cmd {
        // One-shot mode
        run_oneshot(&cli, &config, cmd_str).await
    } else {
        // REPL mode
        repl::run_repl(&cli, &config).await
    }
}

async fn run_oneshot(cli: &Cli, config: &ChainConfig, cmd_str: &str) -> Result<()> {
    // Parse everything up front so a typo doesn't leave a half-run script.
    let commands = cmd_str
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Command::parse(s).with_context(|| format!("in '{s}'")))
        .collect::<Result<Vec<_>>>()?;
    if commands.is_empty() {
        bail!("No command given to --cmd.");
    }

    let view = cli.build_view(config);
    for command in commands {
        if command == Command::Exit {
            break;
        }
        let output = command.execute(&view, cli.json).await?;
        if !output.is_empty() {
            println!("{output}");
        }
    }
    view.session().shutdown();
    Ok(())
}
