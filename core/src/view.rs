//! Contract interaction view: the artifact selection, the last deployment,
//! the transfer amount, and the handlers that drive upload, instantiate and
//! funded execute through the session's signing handle.
//!
//! Every handler checks its preconditions before touching the network and
//! reports failures as [`DeployError`]s. Nothing is retried or rolled back:
//! a successful upload followed by a failed instantiate keeps the new code id.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::client::msg::execute_msg;
use crate::client::{
    BroadcastResult, Coin, EntryPoint, FeeMode, InstantiateResult, UploadResult,
};
use crate::config::DEFAULT_LABEL;
use crate::error::{DeployError, Result};
use crate::session::{ActiveSession, SessionProvider};

pub const JUNO_DENOM: &str = "ujuno";
/// Noble USDC as seen on Juno through IBC.
pub const USDC_DENOM: &str =
    "ibc/EAC38D55372F38F1AFD68DF7FE9EF762DCF69F26520643CF3F9D292A738D8034";
/// Contract address shown before anything has been instantiated.
pub const NO_CONTRACT: &str = "N/A";

/// Preset funded sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAction {
    Juno,
    Usdc,
}

impl SendAction {
    pub fn denom(self) -> &'static str {
        match self {
            Self::Juno => JUNO_DENOM,
            Self::Usdc => USDC_DENOM,
        }
    }

    pub fn entry_point(self) -> EntryPoint {
        match self {
            Self::Juno => EntryPoint::Route,
            Self::Usdc => EntryPoint::RouteWithSender,
        }
    }
}

impl fmt::Display for SendAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Juno => f.write_str("juno"),
            Self::Usdc => f.write_str("usdc"),
        }
    }
}

impl FromStr for SendAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "juno" => Ok(Self::Juno),
            "usdc" => Ok(Self::Usdc),
            other => Err(format!("Unknown send preset: '{other}'")),
        }
    }
}

#[derive(Debug, Default)]
struct Artifact {
    path: Option<PathBuf>,
    bytes: Option<Vec<u8>>,
    /// Bumped on every selection; a read only lands if it still matches.
    generation: u64,
}

#[derive(Debug)]
struct ViewState {
    artifact: Artifact,
    last_code_id: u64,
    last_contract_address: String,
    amount: Option<u128>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            artifact: Artifact::default(),
            last_code_id: 0,
            last_contract_address: NO_CONTRACT.to_string(),
            amount: None,
        }
    }
}

/// Point-in-time copy of everything the view shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewStatus {
    pub connected: bool,
    pub display_name: String,
    pub address: String,
    pub file: Option<String>,
    pub bytes: Option<usize>,
    pub last_code_id: u64,
    pub last_contract_address: String,
    pub amount: Option<u128>,
}

/// Result of a full upload + instantiate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub upload: UploadResult,
    pub instantiate: InstantiateResult,
}

pub struct ContractView {
    session: Arc<SessionProvider>,
    state: Arc<Mutex<ViewState>>,
    label: String,
    fee: FeeMode,
}

impl ContractView {
    pub fn new(session: Arc<SessionProvider>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(ViewState::default())),
            label: DEFAULT_LABEL.to_string(),
            fee: FeeMode::Auto,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_fee(mut self, fee: FeeMode) -> Self {
        self.fee = fee;
        self
    }

    pub fn session(&self) -> &Arc<SessionProvider> {
        &self.session
    }

    /// Select a contract binary and start reading it in the background.
    ///
    /// The path is replaced immediately. Bytes from the previous selection
    /// stay in place until the read finishes; a read that completes after a
    /// newer selection is dropped, and a failed read leaves the bytes alone.
    /// Must be called inside a tokio runtime.
    pub fn select_file(&self, path: impl AsRef<Path>) -> Result<JoinHandle<Result<usize>>> {
        let path = path.as_ref().to_path_buf();
        let is_wasm = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wasm"));
        if !is_wasm {
            return Err(DeployError::InvalidArtifact(format!(
                "{} is not a .wasm file",
                path.display()
            )));
        }

        let generation = {
            let mut state = self.lock();
            state.artifact.generation += 1;
            state.artifact.path = Some(path.clone());
            state.artifact.generation
        };
        tracing::debug!(path = %path.display(), generation, "artifact selected");

        let state = self.state.clone();
        Ok(tokio::spawn(async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(source) => {
                    tracing::warn!(path = %path.display(), "failed to read artifact: {source}");
                    return Err(DeployError::FileRead {
                        path: path.display().to_string(),
                        source,
                    });
                }
            };
            let len = bytes.len();
            let mut state = lock(&state);
            if state.artifact.generation == generation {
                state.artifact.bytes = Some(bytes);
                tracing::info!(path = %path.display(), bytes = len, "artifact loaded");
            } else {
                tracing::debug!(path = %path.display(), "discarding read of superseded selection");
            }
            Ok(len)
        }))
    }

    /// Set the amount shared by the preset sends. Zero clears it.
    pub fn set_amount(&self, amount: Option<u128>) {
        self.lock().amount = amount.filter(|a| *a > 0);
    }

    pub fn amount(&self) -> Option<u128> {
        self.lock().amount
    }

    pub fn last_code_id(&self) -> u64 {
        self.lock().last_code_id
    }

    pub fn last_contract_address(&self) -> String {
        self.lock().last_contract_address.clone()
    }

    /// Upload the selected binary, then instantiate the new code id.
    pub async fn upload_and_init(&self) -> Result<Deployment> {
        report("upload", self.try_upload_and_init().await)
    }

    async fn try_upload_and_init(&self) -> Result<Deployment> {
        let session = self.require_session()?;
        let wasm = {
            let state = self.lock();
            match (&state.artifact.path, &state.artifact.bytes) {
                (Some(_), Some(bytes)) => bytes.clone(),
                _ => return Err(DeployError::NoArtifact),
            }
        };

        let upload = session
            .handle
            .upload(&session.address, &wasm, self.fee.clone())
            .await?;
        self.lock().last_code_id = upload.code_id;
        tracing::info!(
            code_id = upload.code_id,
            tx = %upload.transaction_hash,
            original_size = upload.original_size,
            compressed_size = upload.compressed_size,
            original_checksum = %upload.original_checksum,
            compressed_checksum = %upload.compressed_checksum,
            "code uploaded"
        );

        let instantiate = self.instantiate(&session, upload.code_id).await?;
        Ok(Deployment {
            upload,
            instantiate,
        })
    }

    /// Instantiate an already uploaded code id.
    pub async fn init_existing(&self, code_id: u64) -> Result<InstantiateResult> {
        let result = match self.require_session() {
            Ok(session) => self.instantiate(&session, code_id).await,
            Err(e) => Err(e),
        };
        report("instantiate", result)
    }

    async fn instantiate(&self, session: &ActiveSession, code_id: u64) -> Result<InstantiateResult> {
        let result = session
            .handle
            .instantiate(
                &session.address,
                code_id,
                &json!({}),
                &self.label,
                self.fee.clone(),
            )
            .await?;
        self.lock().last_contract_address = result.contract_address.clone();
        tracing::info!(
            code_id,
            contract = %result.contract_address,
            tx = %result.transaction_hash,
            gas_used = result.gas_used,
            gas_wanted = result.gas_wanted,
            "contract instantiated"
        );
        Ok(result)
    }

    /// Execute `entry_point` on the last instantiated contract, attaching
    /// `amount` of `denom`.
    pub async fn send_funded(
        &self,
        entry_point: EntryPoint,
        denom: &str,
        amount: u128,
    ) -> Result<BroadcastResult> {
        report(
            "send",
            self.try_send_funded(entry_point, denom, Some(amount)).await,
        )
    }

    /// Run a preset send with the stored amount.
    pub async fn send_action(&self, action: SendAction) -> Result<BroadcastResult> {
        let amount = self.amount();
        report(
            "send",
            self.try_send_funded(action.entry_point(), action.denom(), amount)
                .await,
        )
    }

    async fn try_send_funded(
        &self,
        entry_point: EntryPoint,
        denom: &str,
        amount: Option<u128>,
    ) -> Result<BroadcastResult> {
        let session = self.require_session()?;
        let amount = amount.filter(|a| *a > 0).ok_or(DeployError::MissingAmount)?;
        let contract = self.last_contract_address();
        if contract.is_empty() || contract == NO_CONTRACT {
            return Err(DeployError::NoContract);
        }

        let msg = execute_msg(
            &session.address,
            &contract,
            entry_point,
            vec![Coin::new(amount, denom)],
        );
        let result = session
            .handle
            .sign_and_broadcast(&session.address, vec![msg], self.fee.clone())
            .await?;
        tracing::info!(
            %entry_point,
            denom,
            amount = %amount,
            contract = %contract,
            tx = %result.transaction_hash,
            "funded execute broadcast"
        );
        Ok(result)
    }

    pub fn status(&self) -> ViewStatus {
        let session = self.session.active();
        let state = self.lock();
        ViewStatus {
            connected: session.is_some(),
            display_name: session
                .as_ref()
                .map(|s| s.display_name.clone())
                .unwrap_or_default(),
            address: session.map(|s| s.address).unwrap_or_default(),
            file: state
                .artifact
                .path
                .as_ref()
                .map(|p| p.display().to_string()),
            bytes: state.artifact.bytes.as_ref().map(Vec::len),
            last_code_id: state.last_code_id,
            last_contract_address: state.last_contract_address.clone(),
            amount: state.amount,
        }
    }

    fn require_session(&self) -> Result<ActiveSession> {
        self.session.active().ok_or(DeployError::NotConnected)
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn report<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::warn!(operation, "{e}");
    }
    result
}
