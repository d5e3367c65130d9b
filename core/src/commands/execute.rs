use anyhow::{Context, Result};

use super::help::help_text;
use super::{Command, SendTarget};
use crate::client::EntryPoint;
use crate::display;
use crate::view::ContractView;

impl Command {
    /// Execute a command against the view and return the output string.
    pub async fn execute(&self, view: &ContractView, json_output: bool) -> Result<String> {
        match self {
            Command::Connect => {
                view.session().connect().await?;
                connection_output(view, json_output)
            }

            Command::Disconnect => {
                view.session().disconnect();
                connection_output(view, json_output)
            }

            Command::Toggle => {
                view.session().toggle().await?;
                connection_output(view, json_output)
            }

            Command::Status => {
                let status = view.status();
                if json_output {
                    Ok(serde_json::to_string_pretty(&status)?)
                } else {
                    Ok(display::format_status(&status))
                }
            }

            Command::Select { path } => {
                let bytes = view
                    .select_file(path)?
                    .await
                    .context("artifact read task failed")??;
                if json_output {
                    Ok(serde_json::json!({
                        "file": path.display().to_string(),
                        "bytes": bytes,
                    })
                    .to_string())
                } else {
                    Ok(format!(
                        "Selected {} ({})",
                        path.display(),
                        display::format_size(bytes)
                    ))
                }
            }

            Command::Upload => {
                let deployment = view.upload_and_init().await?;
                if json_output {
                    Ok(serde_json::to_string_pretty(&deployment)?)
                } else {
                    Ok(display::format_deployment(&deployment))
                }
            }

            Command::Init { code_id } => {
                let result = view.init_existing(*code_id).await?;
                if json_output {
                    Ok(serde_json::to_string_pretty(&result)?)
                } else {
                    Ok(display::format_instantiate(&result))
                }
            }

            Command::Amount { amount } => {
                view.set_amount(Some(*amount));
                let stored = view.amount();
                if json_output {
                    Ok(serde_json::json!({ "amount": stored.map(|a| a.to_string()) }).to_string())
                } else {
                    Ok(match stored {
                        Some(a) => format!("Amount set to {a}"),
                        None => "Amount cleared".to_string(),
                    })
                }
            }

            Command::Send {
                target,
                amount,
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
                let (result, sent) = match (target, amount, entry_point) {
                    (SendTarget::Preset(action), None, ep) if ep == action.entry_point() => {
                        let sent = view.amount().unwrap_or(0);
                        (view.send_action(*action).await?, sent)
                    }
                    _ => {
                        let sent = amount.or_else(|| view.amount()).unwrap_or(0);
                        (view.send_funded(entry_point, denom, sent).await?, sent)
                    }
                };
                if json_output {
                    Ok(serde_json::json!({
                        "transaction_hash": result.transaction_hash,
                        "height": result.height,
                        "gas_used": result.gas_used,
                        "gas_wanted": result.gas_wanted,
                        "amount": sent.to_string(),
                        "denom": denom,
                        "entry_point": entry_point.selector(),
                        "contract": view.last_contract_address(),
                    })
                    .to_string())
                } else {
                    Ok(display::format_broadcast(&result, sent, denom))
                }
            }

            Command::Help { command } => Ok(help_text(command.as_deref())),

            // Handled by the REPL loop
            Command::Exit => Ok(String::new()),
        }
    }
}

fn connection_output(view: &ContractView, json_output: bool) -> Result<String> {
    let status = view.status();
    if json_output {
        return Ok(serde_json::json!({
            "connected": status.connected,
            "name": status.display_name,
            "address": status.address,
            "chain_id": view.session().chain_id(),
        })
        .to_string());
    }
    if status.connected {
        Ok(format!(
            "Connected as {} ({}) on {}",
            display::connect_label(&status),
            status.address,
            view.session().chain_id(),
        ))
    } else {
        Ok("Disconnected".to_string())
    }
}
