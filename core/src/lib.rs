use std::path::PathBuf;

use anyhow::Context;

pub mod client;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod session;
pub mod view;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use client::{EntryPoint, FeeMode, RestClient, SigningClient};
pub use commands::Command;
pub use config::{ChainConfig, GasPrice, Network};
pub use error::DeployError;
pub use session::{Connector, RestConnector, SessionProvider};
pub use view::{ContractView, SendAction};
pub use wallet::{BridgeWallet, WalletExtension};

/// XDG-compliant data directory for REPL history.
/// Linux: `~/.local/share/wasmdeploy/`, macOS: `~/Library/Application Support/wasmdeploy/`
pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Cannot determine data directory")?
        .join("wasmdeploy");
    Ok(dir)
}
