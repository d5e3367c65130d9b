//! In-process wallet, client, and connector doubles for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::client::proto::SignDoc;
use crate::client::{
    BroadcastResult, ContractMsg, FeeMode, InstantiateResult, SigningClient, UploadResult,
};
use crate::error::{DeployError, Result};
use crate::session::Connector;
use crate::wallet::{DirectSignResponse, WalletAccount, WalletEvent, WalletExtension};

pub(crate) struct MockWallet {
    account: Mutex<WalletAccount>,
    reject: AtomicBool,
    delay: Mutex<Duration>,
    enabled: Mutex<Vec<String>>,
    sign_requests: Mutex<Vec<SignDoc>>,
    auth_info_override: Mutex<Option<Vec<u8>>>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub(crate) fn new(name: &str, address: &str) -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            account: Mutex::new(account(name, address)),
            reject: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            enabled: Mutex::new(Vec::new()),
            sign_requests: Mutex::new(Vec::new()),
            auth_info_override: Mutex::new(None),
            events,
        }
    }

    pub(crate) fn set_account(&self, name: &str, address: &str) {
        *self.account.lock().unwrap() = account(name, address);
    }

    pub(crate) fn reject_access(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn enabled_chains(&self) -> Vec<String> {
        self.enabled.lock().unwrap().clone()
    }

    /// Sign docs as the wallet received them.
    pub(crate) fn sign_requests(&self) -> Vec<SignDoc> {
        self.sign_requests.lock().unwrap().clone()
    }

    /// Replace the auth info of every signed doc, as a wallet adjusting the fee would.
    pub(crate) fn rewrite_auth_info(&self, bytes: Vec<u8>) {
        *self.auth_info_override.lock().unwrap() = Some(bytes);
    }

    pub(crate) fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }
}

fn account(name: &str, address: &str) -> WalletAccount {
    WalletAccount {
        name: name.to_string(),
        address: address.to_string(),
        pub_key: vec![2u8; 33],
    }
}

#[async_trait]
impl WalletExtension for MockWallet {
    async fn enable(&self, chain_id: &str) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(DeployError::AccessRejected("Request rejected".into()));
        }
        self.enabled.lock().unwrap().push(chain_id.to_string());
        Ok(())
    }

    async fn get_key(&self, _chain_id: &str) -> Result<WalletAccount> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn sign_direct(
        &self,
        _chain_id: &str,
        _signer: &str,
        doc: SignDoc,
    ) -> Result<DirectSignResponse> {
        self.sign_requests.lock().unwrap().push(doc.clone());
        let mut signed = doc;
        if let Some(bytes) = self.auth_info_override.lock().unwrap().clone() {
            signed.auth_info_bytes = bytes;
        }
        Ok(DirectSignResponse {
            signed,
            signature: vec![0u8; 64],
            pub_key: vec![2u8; 33],
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Upload {
        sender: String,
        size: usize,
    },
    Instantiate {
        sender: String,
        code_id: u64,
        msg: Value,
        label: String,
    },
    Broadcast {
        sender: String,
        msgs: Vec<ContractMsg>,
    },
}

pub(crate) struct MockClient {
    calls: Mutex<Vec<Call>>,
    code_id: AtomicU64,
    contract_address: Mutex<String>,
    tx_hash: Mutex<String>,
    fail_upload: AtomicBool,
    fail_instantiate: AtomicBool,
    fail_broadcast: AtomicBool,
}

impl Default for MockClient {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            code_id: AtomicU64::new(42),
            contract_address: Mutex::new("juno1contract".into()),
            tx_hash: Mutex::new("HASH".into()),
            fail_upload: AtomicBool::new(false),
            fail_instantiate: AtomicBool::new(false),
            fail_broadcast: AtomicBool::new(false),
        }
    }
}

impl MockClient {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn set_code_id(&self, id: u64) {
        self.code_id.store(id, Ordering::SeqCst);
    }

    pub(crate) fn set_contract_address(&self, addr: &str) {
        *self.contract_address.lock().unwrap() = addr.to_string();
    }

    pub(crate) fn set_tx_hash(&self, hash: &str) {
        *self.tx_hash.lock().unwrap() = hash.to_string();
    }

    pub(crate) fn fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_instantiate(&self, fail: bool) {
        self.fail_instantiate.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_broadcast(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SigningClient for MockClient {
    async fn upload(&self, sender: &str, wasm: &[u8], _fee: FeeMode) -> Result<UploadResult> {
        self.record(Call::Upload {
            sender: sender.to_string(),
            size: wasm.len(),
        });
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(DeployError::Network("upload rejected".into()));
        }
        Ok(UploadResult {
            code_id: self.code_id.load(Ordering::SeqCst),
            transaction_hash: "UPLOADHASH".into(),
            original_size: wasm.len(),
            compressed_size: wasm.len() / 2,
            original_checksum: "00".into(),
            compressed_checksum: "11".into(),
            gas_used: 1_000_000,
            gas_wanted: 1_300_000,
        })
    }

    async fn instantiate(
        &self,
        sender: &str,
        code_id: u64,
        msg: &Value,
        label: &str,
        _fee: FeeMode,
    ) -> Result<InstantiateResult> {
        self.record(Call::Instantiate {
            sender: sender.to_string(),
            code_id,
            msg: msg.clone(),
            label: label.to_string(),
        });
        if self.fail_instantiate.load(Ordering::SeqCst) {
            return Err(DeployError::Broadcast {
                code: 5,
                log: "instantiate failed".into(),
            });
        }
        Ok(InstantiateResult {
            contract_address: self.contract_address.lock().unwrap().clone(),
            transaction_hash: "INITHASH".into(),
            gas_used: 150_000,
            gas_wanted: 200_000,
        })
    }

    async fn sign_and_broadcast(
        &self,
        sender: &str,
        msgs: Vec<ContractMsg>,
        _fee: FeeMode,
    ) -> Result<BroadcastResult> {
        self.record(Call::Broadcast {
            sender: sender.to_string(),
            msgs,
        });
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(DeployError::Broadcast {
                code: 5,
                log: "insufficient funds".into(),
            });
        }
        Ok(BroadcastResult {
            transaction_hash: self.tx_hash.lock().unwrap().clone(),
            height: 100,
            gas_used: 90_000,
            gas_wanted: 120_000,
        })
    }
}

/// Hands out the same [`MockClient`] on every connect.
pub(crate) struct MockConnector {
    client: Arc<MockClient>,
    connects: AtomicUsize,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self {
            client: Arc::new(MockClient::default()),
            connects: AtomicUsize::new(0),
        }
    }
}

impl MockConnector {
    pub(crate) fn client(&self) -> &Arc<MockClient> {
        &self.client
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _account: &WalletAccount) -> Result<Arc<dyn SigningClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }
}
