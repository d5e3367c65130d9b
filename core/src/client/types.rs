use serde::Serialize;

use super::proto::Coin;
use crate::config::GasPrice;

/// Fee policy for a transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeeMode {
    /// Simulate, apply the gas adjustment, price with the configured gas price.
    #[default]
    Auto,
    Fixed { gas: u64, amount: Vec<Coin> },
}

impl FeeMode {
    /// Fixed gas limit, priced with `price`.
    pub fn fixed_gas(gas: u64, price: &GasPrice) -> Self {
        Self::Fixed {
            gas,
            amount: vec![Coin::new(price.fee_for(gas), price.denom.clone())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_gas_is_priced() {
        let fee = FeeMode::fixed_gas(200_000, &GasPrice::new(0.025, "ujunox"));
        assert_eq!(
            fee,
            FeeMode::Fixed {
                gas: 200_000,
                amount: vec![Coin::new(5_000, "ujunox")],
            }
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub code_id: u64,
    pub transaction_hash: String,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Hex SHA-256 of the uncompressed binary.
    pub original_checksum: String,
    /// Hex SHA-256 of the gzip payload.
    pub compressed_checksum: String,
    pub gas_used: u64,
    pub gas_wanted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstantiateResult {
    pub contract_address: String,
    pub transaction_hash: String,
    pub gas_used: u64,
    pub gas_wanted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastResult {
    pub transaction_hash: String,
    pub height: u64,
    pub gas_used: u64,
    pub gas_wanted: u64,
}
