//! Domain error type for deployer operations.

use thiserror::Error;

/// Typed error enum for deployer operations, allowing callers to match on
/// specific failure modes instead of inspecting opaque `anyhow::Error` messages.
#[derive(Debug, Error)]
pub enum DeployError {
    /// No wallet session is active.
    #[error("No wallet connected. Use 'connect' first.")]
    NotConnected,

    /// Upload requested before a contract binary finished loading.
    #[error("No contract file loaded. Use 'select <path.wasm>' first.")]
    NoArtifact,

    /// Send requested without a usable amount.
    #[error("No amount entered. Use 'amount <n>' or pass one to 'send'.")]
    MissingAmount,

    /// Send requested before any contract was instantiated.
    #[error("No contract address yet. Run 'upload' or 'init <code_id>' first.")]
    NoContract,

    /// The selected file is not an acceptable contract binary.
    #[error("{0}")]
    InvalidArtifact(String),

    /// Reading the selected file failed.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The wallet bridge could not be reached.
    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The user declined access or the wallet refused the chain.
    #[error("Wallet rejected the request: {0}")]
    AccessRejected(String),

    /// Signing or other wallet-side failure.
    #[error("{0}")]
    Wallet(String),

    /// REST endpoint communication failure.
    #[error("{0}")]
    Network(String),

    /// The chain rejected a transaction.
    #[error("Transaction failed with code {code}: {log}")]
    Broadcast { code: u32, log: String },

    /// Invalid state or configuration.
    #[error("{0}")]
    InvalidState(String),

    /// Unexpected error from internal subsystems.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeployError {
    /// True for failures detected locally before any external call.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::NoArtifact | Self::MissingAmount | Self::NoContract
        )
    }
}

/// Alias for `std::result::Result<T, DeployError>`.
pub type Result<T> = std::result::Result<T, DeployError>;
