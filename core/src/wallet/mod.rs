/// Wallet extension abstraction: account discovery, direct-mode signing, and
/// account-change notifications.
mod bridge;
mod protocol;

pub use bridge::BridgeWallet;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::client::proto::SignDoc;
use crate::error::Result;

/// Account exposed by the wallet for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletAccount {
    /// Display nickname chosen in the wallet.
    pub name: String,
    /// Bech32 account address.
    pub address: String,
    /// Compressed secp256k1 public key.
    pub pub_key: Vec<u8>,
}

/// Result of a direct-mode signature. The wallet may rewrite the body or
/// auth info (e.g. fee adjustments), so `signed` is what must be broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectSignResponse {
    pub signed: SignDoc,
    pub signature: Vec<u8>,
    pub pub_key: Vec<u8>,
}

/// Notifications pushed by the wallet outside of any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEvent {
    /// The user switched or locked accounts.
    KeystoreChange,
}

#[async_trait]
pub trait WalletExtension: Send + Sync {
    /// Ask the user to grant access for `chain_id`.
    async fn enable(&self, chain_id: &str) -> Result<()>;

    /// Active account for `chain_id`.
    async fn get_key(&self, chain_id: &str) -> Result<WalletAccount>;

    /// Sign a transaction in direct mode.
    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        doc: SignDoc,
    ) -> Result<DirectSignResponse>;

    /// Receiver for wallet-originated events.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}
