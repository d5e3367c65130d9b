/// Signing/broadcast client: upload, instantiate, and execute through a
/// wallet-backed signer.
pub mod msg;
pub mod proto;
mod rest;
mod types;

pub use msg::{ContractMsg, EntryPoint};
pub use proto::Coin;
pub use rest::RestClient;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Capability bound to one account that can sign and broadcast.
#[async_trait]
pub trait SigningClient: Send + Sync {
    /// Upload contract code. `wasm` is the raw (uncompressed) binary.
    async fn upload(&self, sender: &str, wasm: &[u8], fee: FeeMode) -> Result<UploadResult>;

    /// Instantiate a stored code id with `msg` as init payload.
    async fn instantiate(
        &self,
        sender: &str,
        code_id: u64,
        msg: &Value,
        label: &str,
        fee: FeeMode,
    ) -> Result<InstantiateResult>;

    /// Sign and broadcast `msgs` as one transaction.
    async fn sign_and_broadcast(
        &self,
        sender: &str,
        msgs: Vec<ContractMsg>,
        fee: FeeMode,
    ) -> Result<BroadcastResult>;
}
