/// Output formatting for the REPL: amounts, sizes, and the result of each
/// deployer operation, in text and JSON form.
use crate::client::{BroadcastResult, InstantiateResult};
use crate::view::{Deployment, ViewStatus, USDC_DENOM};

/// Label of the connect control: the wallet nickname when connected.
#[must_use]
pub fn connect_label(status: &ViewStatus) -> String {
    if status.connected && !status.display_name.is_empty() {
        status.display_name.clone()
    } else if status.connected {
        status.address.clone()
    } else {
        "Connect".to_string()
    }
}

/// Short name for well-known denoms, the raw denom otherwise.
#[must_use]
pub fn denom_label(denom: &str) -> &str {
    if denom == USDC_DENOM {
        "USDC"
    } else {
        denom
    }
}

/// Examples: (100, "ujuno") -> "100 ujuno", (5, <usdc ibc denom>) -> "5 USDC"
#[must_use]
pub fn format_coin(amount: u128, denom: &str) -> String {
    format!("{amount} {}", denom_label(denom))
}

/// Byte count with a binary-unit hint for larger files.
/// Examples: 512 -> "512 bytes", 2048 -> "2048 bytes (2.0 KiB)"
#[must_use]
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{bytes} bytes ({:.1} MiB)", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{bytes} bytes ({:.1} KiB)", b / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Parse a base-unit amount. Only plain non-negative integers are accepted.
#[must_use = "parsing result should be checked"]
pub fn parse_amount(input: &str) -> Result<u128, String> {
    let input = input.trim().replace('_', "");

    if input.is_empty() {
        return Err("Amount cannot be empty".to_string());
    }
    if input.starts_with('-') {
        return Err("Amount must be positive".to_string());
    }
    if !input.chars().all(|c| c.is_ascii_digit()) {
        return Err("Amount must be a whole number of base units".to_string());
    }
    input
        .parse::<u128>()
        .map_err(|_| "Amount too large".to_string())
}

#[must_use]
pub fn format_status(status: &ViewStatus) -> String {
    let wallet = if status.connected {
        format!("{} ({})", connect_label(status), status.address)
    } else {
        "not connected".to_string()
    };
    let file = match (&status.file, status.bytes) {
        (Some(path), Some(bytes)) => format!("{path} ({})", format_size(bytes)),
        (Some(path), None) => format!("{path} (reading...)"),
        (None, _) => "none selected".to_string(),
    };
    let amount = status
        .amount
        .map(|a| a.to_string())
        .unwrap_or_else(|| "not set".to_string());
    format!(
        "  Wallet:    {wallet}\n  File:      {file}\n  Code ID:   {}\n  Contract:  {}\n  Amount:    {amount}",
        status.last_code_id, status.last_contract_address,
    )
}

#[must_use]
pub fn format_deployment(deployment: &Deployment) -> String {
    let upload = &deployment.upload;
    format!(
        "Code uploaded!\n  Code ID:     {}\n  Upload tx:   {}\n  Size:        {} -> {} compressed\n  Checksum:    {}\n  Compressed:  {}\n{}",
        upload.code_id,
        upload.transaction_hash,
        format_size(upload.original_size),
        format_size(upload.compressed_size),
        upload.original_checksum,
        upload.compressed_checksum,
        format_instantiate(&deployment.instantiate),
    )
}

#[must_use]
pub fn format_instantiate(result: &InstantiateResult) -> String {
    format!(
        "Contract instantiated!\n  Address:     {}\n  Init tx:     {}\n  Gas:         {} used / {} wanted",
        result.contract_address, result.transaction_hash, result.gas_used, result.gas_wanted,
    )
}

#[must_use]
pub fn format_broadcast(result: &BroadcastResult, amount: u128, denom: &str) -> String {
    format!(
        "Transaction sent!\n  Hash:   {}\n  Height: {}\n  Amount: {}\n  Gas:    {} used / {} wanted",
        result.transaction_hash,
        result.height,
        format_coin(amount, denom),
        result.gas_used,
        result.gas_wanted,
    )
}
