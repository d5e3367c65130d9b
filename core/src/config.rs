/// Chain configuration: network presets, REST endpoint, and fee parameters.
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Label attached to every instantiated contract unless overridden.
pub const DEFAULT_LABEL: &str = "test";

/// Multiplier applied to simulated gas when fees are estimated automatically.
pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.3;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Local,
    Custom,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
            Network::Local => write!(f, "local"),
            Network::Custom => write!(f, "custom"),
        }
    }
}

impl Network {
    fn default_chain_id(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("juno-1"),
            Network::Testnet => Some("uni-6"),
            Network::Local => Some("testing"),
            Network::Custom => None,
        }
    }

    fn default_rest_url(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("https://rest.cosmos.directory/juno"),
            Network::Testnet => Some("https://juno-testnet-api.polkachu.com"),
            Network::Local => Some("http://localhost:1317"),
            Network::Custom => None,
        }
    }

    fn default_gas_price(self) -> GasPrice {
        match self {
            Network::Mainnet => GasPrice::new(0.075, "ujuno"),
            Network::Testnet => GasPrice::new(0.025, "ujunox"),
            Network::Local | Network::Custom => GasPrice::new(0.025, "ujuno"),
        }
    }
}

/// Price per unit of gas, e.g. `0.025ujuno`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GasPrice {
    pub amount: f64,
    pub denom: String,
}

impl GasPrice {
    pub fn new(amount: f64, denom: impl Into<String>) -> Self {
        Self {
            amount,
            denom: denom.into(),
        }
    }

    /// Fee for `gas` units, rounded up to a whole base unit.
    pub fn fee_for(&self, gas: u64) -> u128 {
        (self.amount * gas as f64).ceil() as u128
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for GasPrice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() || denom.is_empty() {
            bail!("Invalid gas price '{s}'. Expected e.g. '0.025ujuno'.");
        }
        let amount: f64 = amount
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid gas price amount in '{s}'"))?;
        if !amount.is_finite() || amount < 0.0 {
            bail!("Gas price must be a non-negative number: '{s}'");
        }
        Ok(Self::new(amount, denom))
    }
}

/// Everything needed to talk to one chain.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChainConfig {
    pub network: Network,
    pub chain_id: String,
    pub rest_url: String,
    pub gas_price: GasPrice,
    pub gas_adjustment: f64,
    pub label: String,
}

impl ChainConfig {
    /// Configuration for a built-in network. `Custom` has no preset.
    pub fn preset(network: Network) -> Result<Self> {
        let (Some(chain_id), Some(rest_url)) = (network.default_chain_id(), network.default_rest_url())
        else {
            bail!("Custom network requires a REST URL and a chain id");
        };
        Ok(Self {
            network,
            chain_id: chain_id.to_string(),
            rest_url: rest_url.to_string(),
            gas_price: network.default_gas_price(),
            gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
            label: DEFAULT_LABEL.to_string(),
        })
    }

    /// Configuration for an arbitrary REST endpoint.
    pub fn custom(rest_url: &str, chain_id: &str, allow_insecure: bool) -> Result<Self> {
        validate_rest_url(rest_url, allow_insecure)?;
        if chain_id.trim().is_empty() {
            bail!("Custom network requires a chain id. Use --chain-id.");
        }
        Ok(Self {
            network: Network::Custom,
            chain_id: chain_id.trim().to_string(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
            gas_price: Network::Custom.default_gas_price(),
            gas_adjustment: DEFAULT_GAS_ADJUSTMENT,
            label: DEFAULT_LABEL.to_string(),
        })
    }
}

/// Reject non-HTTPS REST URLs unless `allow_insecure` is set.
pub fn validate_rest_url(url: &str, allow_insecure: bool) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        if allow_insecure {
            return Ok(());
        }
        bail!("Refusing to connect over plain HTTP: {url}\nUse --insecure to allow unencrypted connections.");
    }
    bail!("Invalid REST URL scheme: {url}\nExpected an https:// URL.");
}
