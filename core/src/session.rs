//! Wallet session provider: owns the connection to the wallet and hands out
//! a signing handle bound to the active account.
//!
//! The provider is an explicit, shareable context rather than global state.
//! It subscribes to wallet account-change events when started and drops the
//! subscription on [`SessionProvider::shutdown`] or drop. An account change
//! tears the session down and immediately reconnects against whatever
//! account is now active; only one such reconnect runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

use crate::client::{RestClient, SigningClient};
use crate::config::ChainConfig;
use crate::error::{DeployError, Result};
use crate::wallet::{WalletAccount, WalletEvent, WalletExtension};

/// Builds a signing handle for a freshly authorized account.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, account: &WalletAccount) -> Result<Arc<dyn SigningClient>>;
}

/// Connector producing [`RestClient`] handles for one chain.
pub struct RestConnector {
    config: ChainConfig,
    wallet: Arc<dyn WalletExtension>,
}

impl RestConnector {
    pub fn new(config: ChainConfig, wallet: Arc<dyn WalletExtension>) -> Self {
        Self { config, wallet }
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self, account: &WalletAccount) -> Result<Arc<dyn SigningClient>> {
        let client = RestClient::new(self.config.clone(), self.wallet.clone(), account.clone())?;
        Ok(Arc::new(client))
    }
}

/// A connected session. Exists only with a non-empty address and a handle.
#[derive(Clone)]
pub struct ActiveSession {
    pub address: String,
    pub display_name: String,
    pub handle: Arc<dyn SigningClient>,
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("address", &self.address)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

enum SessionState {
    Disconnected,
    Connected(ActiveSession),
}

pub struct SessionProvider {
    wallet: Arc<dyn WalletExtension>,
    connector: Arc<dyn Connector>,
    chain_id: String,
    state: RwLock<SessionState>,
    reconnecting: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionProvider {
    /// Create a disconnected provider without an account-change listener.
    pub fn new(
        wallet: Arc<dyn WalletExtension>,
        connector: Arc<dyn Connector>,
        chain_id: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            connector,
            chain_id: chain_id.into(),
            state: RwLock::new(SessionState::Disconnected),
            reconnecting: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }

    /// Create a provider and subscribe to wallet account changes.
    /// Must be called inside a tokio runtime.
    pub fn start(
        wallet: Arc<dyn WalletExtension>,
        connector: Arc<dyn Connector>,
        chain_id: impl Into<String>,
    ) -> Arc<Self> {
        let provider = Self::new(wallet, connector, chain_id);
        let handle = tokio::spawn(listen(Arc::downgrade(&provider), provider.wallet.subscribe()));
        *lock(&provider.listener) = Some(handle);
        provider
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Request access from the wallet and build a signing handle. On failure
    /// the session is left as it was and the error is returned for reporting.
    pub async fn connect(&self) -> Result<()> {
        match self.try_connect().await {
            Ok(session) => {
                tracing::info!(address = %session.address, name = %session.display_name, "wallet connected");
                *write(&self.state) = SessionState::Connected(session);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("wallet connection failed: {e}");
                Err(e)
            }
        }
    }

    async fn try_connect(&self) -> Result<ActiveSession> {
        self.wallet.enable(&self.chain_id).await?;
        let account = self.wallet.get_key(&self.chain_id).await?;
        if account.address.is_empty() {
            return Err(DeployError::Wallet("wallet returned an empty address".into()));
        }
        let handle = self.connector.connect(&account).await?;
        Ok(ActiveSession {
            address: account.address,
            display_name: account.name,
            handle,
        })
    }

    /// Drop the session. No-op when already disconnected.
    pub fn disconnect(&self) {
        let mut state = write(&self.state);
        if matches!(*state, SessionState::Connected(_)) {
            *state = SessionState::Disconnected;
            tracing::info!("wallet disconnected");
        }
    }

    /// Connect when disconnected, disconnect otherwise.
    pub async fn toggle(&self) -> Result<()> {
        if self.is_connected() {
            self.disconnect();
            Ok(())
        } else {
            self.connect().await
        }
    }

    /// Tear down and reconnect after the wallet switched accounts. Returns
    /// `Ok(false)` if another reconnect was already in flight.
    pub async fn handle_account_change(&self) -> Result<bool> {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("reconnect already in progress, ignoring account change");
            return Ok(false);
        }
        let _guard = ReconnectGuard(&self.reconnecting);
        tracing::info!("wallet account changed, reconnecting");
        self.disconnect();
        self.connect().await.map(|()| true)
    }

    pub fn is_connected(&self) -> bool {
        matches!(*read(&self.state), SessionState::Connected(_))
    }

    /// Active session, if any.
    pub fn active(&self) -> Option<ActiveSession> {
        match &*read(&self.state) {
            SessionState::Connected(s) => Some(s.clone()),
            SessionState::Disconnected => None,
        }
    }

    /// Connected address, or empty when disconnected.
    pub fn address(&self) -> String {
        self.active().map(|s| s.address).unwrap_or_default()
    }

    /// Wallet nickname, or empty when disconnected.
    pub fn display_name(&self) -> String {
        self.active().map(|s| s.display_name).unwrap_or_default()
    }

    pub fn signing_handle(&self) -> Option<Arc<dyn SigningClient>> {
        self.active().map(|s| s.handle)
    }

    /// Stop reacting to wallet events.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Clears the reconnect flag even when the reconnect future is dropped.
struct ReconnectGuard<'a>(&'a AtomicBool);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn listen(
    provider: Weak<SessionProvider>,
    mut events: tokio::sync::broadcast::Receiver<WalletEvent>,
) {
    loop {
        match events.recv().await {
            Ok(WalletEvent::KeystoreChange) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
        // A burst of notifications needs only one reconnect.
        loop {
            match events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => return,
            }
        }
        let Some(provider) = provider.upgrade() else {
            break;
        };
        // Failures are already reported by `connect`.
        let _ = provider.handle_account_change().await;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}
