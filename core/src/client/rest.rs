use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::msg::{self, ContractMsg};
use super::proto::{
    Any, AuthInfo, Coin, Fee, ModeInfo, PubKey, SignDoc, SignerInfo, TxBody, TxRaw,
    SECP256K1_PUBKEY,
};
use super::types::{BroadcastResult, FeeMode, InstantiateResult, UploadResult};
use super::SigningClient;
use crate::config::ChainConfig;
use crate::error::{DeployError, Result};
use crate::wallet::{WalletAccount, WalletExtension};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(3);
const INCLUSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Signing client backed by the chain's REST (LCD) API. Signatures come from
/// the wallet; this side only assembles, estimates, and broadcasts.
pub struct RestClient {
    http: reqwest::Client,
    config: ChainConfig,
    wallet: Arc<dyn WalletExtension>,
    account: WalletAccount,
    poll_interval: Duration,
    inclusion_timeout: Duration,
}

impl RestClient {
    pub fn new(
        config: ChainConfig,
        wallet: Arc<dyn WalletExtension>,
        account: WalletAccount,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            config,
            wallet,
            account,
            poll_interval: POLL_INTERVAL,
            inclusion_timeout: INCLUSION_TIMEOUT,
        })
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.inclusion_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.rest_url.trim_end_matches('/'))
    }

    /// Account number and sequence for `address`.
    async fn account_info(&self, address: &str) -> anyhow::Result<(u64, u64)> {
        let resp = self
            .http
            .get(self.url(&format!("/cosmos/auth/v1beta1/accounts/{address}")))
            .send()
            .await
            .context("Failed to query account")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            bail!("Account {address} not found on chain. Fund it before deploying.");
        }
        let body: AccountResponse = read_json(resp).await.context("Failed to query account")?;
        body.account.numbers()
    }

    async fn simulate(&self, body_bytes: &[u8], sequence: u64) -> anyhow::Result<u64> {
        let auth_info = auth_info(&self.account.pub_key, sequence, Vec::new(), 0);
        let tx = TxRaw {
            body_bytes: body_bytes.to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            signatures: vec![Vec::new()],
        };
        let resp = self
            .http
            .post(self.url("/cosmos/tx/v1beta1/simulate"))
            .json(&serde_json::json!({ "tx_bytes": Base64::encode_string(&tx.encode_to_vec()) }))
            .send()
            .await
            .context("Simulation request failed")?;
        let body: SimulateResponse = read_json(resp).await.context("Simulation failed")?;
        parse_u64(&body.gas_info.gas_used).context("Invalid gas_used in simulation")
    }

    async fn broadcast(&self, tx: &TxRaw) -> Result<TxResponse> {
        let resp = self
            .http
            .post(self.url("/cosmos/tx/v1beta1/txs"))
            .json(&serde_json::json!({
                "tx_bytes": Base64::encode_string(&tx.encode_to_vec()),
                "mode": "BROADCAST_MODE_SYNC",
            }))
            .send()
            .await
            .map_err(network_err)?;
        let body: BroadcastResponse = read_json(resp)
            .await
            .context("Broadcast failed")
            .map_err(network_err)?;
        let sync = body.tx_response;
        if sync.code != 0 {
            return Err(DeployError::Broadcast {
                code: sync.code,
                log: sync.raw_log,
            });
        }
        tracing::debug!(hash = %sync.txhash, "transaction accepted into mempool");
        self.wait_for_inclusion(&sync.txhash).await
    }

    async fn wait_for_inclusion(&self, hash: &str) -> Result<TxResponse> {
        let deadline = tokio::time::Instant::now() + self.inclusion_timeout;
        let url = self.url(&format!("/cosmos/tx/v1beta1/txs/{hash}"));
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: GetTxResponse = resp.json().await.map_err(network_err)?;
                    let tx = body.tx_response;
                    if tx.code != 0 {
                        return Err(DeployError::Broadcast {
                            code: tx.code,
                            log: tx.raw_log,
                        });
                    }
                    return Ok(tx);
                }
                Ok(resp) => tracing::debug!(status = %resp.status(), "transaction not indexed yet"),
                Err(e) => tracing::debug!("polling for transaction failed: {e}"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DeployError::Network(format!(
                    "Transaction {hash} was not included within {}s",
                    self.inclusion_timeout.as_secs()
                )));
            }
        }
    }

    async fn execute(
        &self,
        sender: &str,
        msgs: Vec<ContractMsg>,
        fee: FeeMode,
    ) -> Result<TxResponse> {
        if sender != self.account.address {
            return Err(DeployError::InvalidState(format!(
                "Sender {sender} does not match the connected account {}",
                self.account.address
            )));
        }
        let (account_number, sequence) = self.account_info(sender).await.map_err(network_err)?;

        let body = TxBody {
            messages: msgs.iter().map(ContractMsg::to_any).collect(),
            memo: String::new(),
            timeout_height: 0,
        };
        let body_bytes = body.encode_to_vec();

        let (gas_limit, amount) = match fee {
            FeeMode::Auto => {
                let simulated = self.simulate(&body_bytes, sequence).await.map_err(network_err)?;
                let gas = gas_limit(simulated, self.config.gas_adjustment);
                let price = &self.config.gas_price;
                tracing::debug!(simulated, gas, "estimated gas");
                (gas, vec![Coin::new(price.fee_for(gas), price.denom.clone())])
            }
            FeeMode::Fixed { gas, amount } => (gas, amount),
        };

        let auth_info = auth_info(&self.account.pub_key, sequence, amount, gas_limit);
        let doc = SignDoc {
            body_bytes,
            auth_info_bytes: auth_info.encode_to_vec(),
            chain_id: self.config.chain_id.clone(),
            account_number,
        };
        let signed = self
            .wallet
            .sign_direct(&self.config.chain_id, sender, doc)
            .await?;

        let tx = TxRaw {
            body_bytes: signed.signed.body_bytes,
            auth_info_bytes: signed.signed.auth_info_bytes,
            signatures: vec![signed.signature],
        };
        self.broadcast(&tx).await
    }
}

#[async_trait]
impl SigningClient for RestClient {
    async fn upload(&self, sender: &str, wasm: &[u8], fee: FeeMode) -> Result<UploadResult> {
        let compressed = gzip(wasm)?;
        let original_checksum = sha256_hex(wasm);
        let compressed_checksum = sha256_hex(&compressed);
        let compressed_size = compressed.len();

        let tx = self
            .execute(sender, vec![msg::store_code_msg(sender, compressed)], fee)
            .await?;
        let code_id = find_attribute(&tx.events, "store_code", "code_id")
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                DeployError::Network(format!("No code id in upload transaction {}", tx.txhash))
            })?;

        Ok(UploadResult {
            code_id,
            transaction_hash: tx.txhash,
            original_size: wasm.len(),
            compressed_size,
            original_checksum,
            compressed_checksum,
            gas_used: tx.gas_used.0,
            gas_wanted: tx.gas_wanted.0,
        })
    }

    async fn instantiate(
        &self,
        sender: &str,
        code_id: u64,
        init: &Value,
        label: &str,
        fee: FeeMode,
    ) -> Result<InstantiateResult> {
        let tx = self
            .execute(sender, vec![msg::instantiate_msg(sender, code_id, init, label)], fee)
            .await?;
        let contract_address = find_attribute(&tx.events, "instantiate", "_contract_address")
            .or_else(|| find_attribute(&tx.events, "wasm", "_contract_address"))
            .map(str::to_string)
            .ok_or_else(|| {
                DeployError::Network(format!(
                    "No contract address in instantiate transaction {}",
                    tx.txhash
                ))
            })?;

        Ok(InstantiateResult {
            contract_address,
            transaction_hash: tx.txhash,
            gas_used: tx.gas_used.0,
            gas_wanted: tx.gas_wanted.0,
        })
    }

    async fn sign_and_broadcast(
        &self,
        sender: &str,
        msgs: Vec<ContractMsg>,
        fee: FeeMode,
    ) -> Result<BroadcastResult> {
        let tx = self.execute(sender, msgs, fee).await?;
        Ok(BroadcastResult {
            transaction_hash: tx.txhash,
            height: tx.height.0,
            gas_used: tx.gas_used.0,
            gas_wanted: tx.gas_wanted.0,
        })
    }
}

fn network_err(e: impl std::fmt::Display) -> DeployError {
    DeployError::Network(format!("{e:#}"))
}

/// Parse a JSON body, turning non-2xx responses into errors that carry the
/// node's message.
async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);
        bail!("HTTP {status}: {message}");
    }
    Ok(resp.json().await?)
}

fn gzip(wasm: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(wasm).context("Failed to compress wasm")?;
    encoder.finish().context("Failed to compress wasm")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn gas_limit(simulated: u64, adjustment: f64) -> u64 {
    (simulated as f64 * adjustment).ceil() as u64
}

fn auth_info(pub_key: &[u8], sequence: u64, amount: Vec<Coin>, gas_limit: u64) -> AuthInfo {
    AuthInfo {
        signer_infos: vec![SignerInfo {
            public_key: Some(Any::pack(
                SECP256K1_PUBKEY,
                &PubKey {
                    key: pub_key.to_vec(),
                },
            )),
            mode_info: Some(ModeInfo::direct()),
            sequence,
        }],
        fee: Some(Fee {
            amount,
            gas_limit,
            payer: String::new(),
            granter: String::new(),
        }),
    }
}

fn find_attribute<'a>(events: &'a [TxEvent], kind: &str, key: &str) -> Option<&'a str> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .flat_map(|e| e.attributes.iter())
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}

fn parse_u64(s: &str) -> anyhow::Result<u64> {
    s.parse().with_context(|| format!("Invalid integer '{s}'"))
}

// -- REST response shapes --

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: AccountInfo,
}

/// Base accounts carry the numbers at the top level; vesting and module
/// accounts nest them in `base_account` (possibly inside
/// `base_vesting_account`).
#[derive(Debug, Deserialize)]
struct AccountInfo {
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    sequence: Option<String>,
    #[serde(default)]
    base_account: Option<Box<AccountInfo>>,
    #[serde(default)]
    base_vesting_account: Option<Box<AccountInfo>>,
}

impl AccountInfo {
    fn numbers(&self) -> anyhow::Result<(u64, u64)> {
        if let (Some(number), Some(sequence)) = (&self.account_number, &self.sequence) {
            return Ok((parse_u64(number)?, parse_u64(sequence)?));
        }
        if let Some(inner) = self.base_account.as_ref().or(self.base_vesting_account.as_ref()) {
            return inner.numbers();
        }
        bail!("Account response has no account number")
    }
}

#[derive(Debug, Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Debug, Deserialize)]
struct GasInfo {
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    tx_response: TxResponse,
}

#[derive(Debug, Deserialize)]
struct GetTxResponse {
    tx_response: TxResponse,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(default)]
    height: IntString,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    gas_wanted: IntString,
    #[serde(default)]
    gas_used: IntString,
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct TxEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Vec<TxAttribute>,
}

#[derive(Debug, Deserialize)]
struct TxAttribute {
    key: String,
    #[serde(default)]
    value: String,
}

/// Cosmos REST encodes 64-bit integers as strings; accept either form.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct IntString(u64);

impl<'de> Deserialize<'de> for IntString {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .map(IntString)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid integer {n}"))),
            Value::String(s) if s.is_empty() => Ok(IntString(0)),
            Value::String(s) => s.parse().map(IntString).map_err(serde::de::Error::custom),
            Value::Null => Ok(IntString(0)),
            other => Err(serde::de::Error::custom(format!("expected integer, got {other}"))),
        }
    }
}
