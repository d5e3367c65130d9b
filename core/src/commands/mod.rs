/// Command definitions and parsing for the deployer REPL and one-shot mode.
mod execute;
mod help;
mod parse;

pub use help::help_text;

use std::fmt;
use std::path::PathBuf;

use crate::client::EntryPoint;
use crate::display;
use crate::view::SendAction;

/// What a `send` command pays in.
#[derive(Debug, Clone, PartialEq)]
pub enum SendTarget {
    /// One of the preset buttons (denom and entry point fixed).
    Preset(SendAction),
    /// Any other denom, e.g. `ujunox` on testnet.
    Denom(String),
}

impl fmt::Display for SendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTarget::Preset(action) => write!(f, "{action}"),
            SendTarget::Denom(denom) => f.write_str(denom),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Request wallet access and bind a signing client
    Connect,
    /// Drop the wallet session
    Disconnect,
    /// Connect when disconnected, otherwise disconnect
    Toggle,
    /// Show session, artifact, and deployment state
    Status,
    /// Pick a contract binary: select <path.wasm>
    Select { path: PathBuf },
    /// Upload the selected binary and instantiate it
    Upload,
    /// Instantiate an uploaded code id: init <code_id>
    Init { code_id: u64 },
    /// Set the amount used by preset sends: amount <n>
    Amount { amount: u128 },
    /// Funded execute: send <juno|usdc|denom> [amount] [entry_point]
    Send {
        target: SendTarget,
        amount: Option<u128>,
        entry_point: Option<EntryPoint>,
    },
    /// Print help
    Help { command: Option<String> },
    /// Exit
    Exit,
}

impl Command {
    /// Returns a confirmation prompt if this command should ask before executing.
    /// Only sends that move funds with an explicit amount are confirmed.
    pub fn confirmation_prompt(&self) -> Option<String> {
        match self {
            Command::Send {
                target,
                amount: Some(amount),
                entry_point,
            } => {
                let (denom, entry_point) = match target {
                    SendTarget::Preset(action) => {
                        (action.denom(), entry_point.unwrap_or(action.entry_point()))
                    }
                    SendTarget::Denom(denom) => {
                        (denom.as_str(), entry_point.unwrap_or(EntryPoint::Route))
                    }
                };
                Some(format!(
                    "Send {} to the contract via '{entry_point}'?",
                    display::format_coin(*amount, denom),
                ))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::USDC_DENOM;

    #[test]
    fn send_with_amount_requires_confirmation() {
        let cmd = Command::Send {
            target: SendTarget::Preset(SendAction::Juno),
            amount: Some(1_500_000),
            entry_point: None,
        };
        let prompt = cmd.confirmation_prompt().unwrap();
        assert!(prompt.contains("1500000 ujuno"));
        assert!(prompt.contains("'route'"));
    }

    #[test]
    fn usdc_prompt_uses_short_name() {
        let cmd = Command::Send {
            target: SendTarget::Preset(SendAction::Usdc),
            amount: Some(5),
            entry_point: None,
        };
        let prompt = cmd.confirmation_prompt().unwrap();
        assert!(prompt.contains("USDC"));
        assert!(!prompt.contains(USDC_DENOM));
        assert!(prompt.contains("'route_with_sender'"));
    }

    #[test]
    fn stored_amount_send_is_not_confirmed() {
        let cmd = Command::Send {
            target: SendTarget::Preset(SendAction::Juno),
            amount: None,
            entry_point: None,
        };
        assert!(cmd.confirmation_prompt().is_none());
        assert!(Command::Upload.confirmation_prompt().is_none());
        assert!(Command::Status.confirmation_prompt().is_none());
    }
}
