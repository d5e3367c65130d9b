/// Client side of the wallet bridge, a browser-extension companion that
/// relays requests to the in-browser wallet.
///
/// The TCP connection is opened lazily on the first request and re-opened
/// after the bridge goes away, so a missing bridge surfaces as a reportable
/// `WalletUnavailable` instead of a startup failure.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use super::protocol::{
    decode_b64, read_frame, write_frame, BridgeError, BridgeFrame, BridgeRequest, KeyResult,
    SignDirectResult, WireSignDoc, MAX_FRAME_LEN,
};
use super::{DirectSignResponse, WalletAccount, WalletEvent, WalletExtension};
use crate::client::proto::SignDoc;
use crate::error::{DeployError, Result};

/// Signing waits on the user, so requests get a generous deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const EVENT_CHANNEL_CAPACITY: usize = 16;

type Reply = std::result::Result<serde_json::Value, BridgeError>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Reply>>>>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

enum Endpoint {
    Tcp(String),
    /// Pre-connected stream; cannot be re-dialed once closed.
    Attached,
}

struct Connection {
    writer: BoxWriter,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        // Fail whoever is still waiting on this connection.
        lock(&self.pending).clear();
    }
}

pub struct BridgeWallet {
    endpoint: Endpoint,
    conn: tokio::sync::Mutex<Option<Connection>>,
    events: broadcast::Sender<WalletEvent>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl BridgeWallet {
    /// Bridge reachable at `addr` (`host:port`). No I/O happens until the
    /// first request.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_endpoint(Endpoint::Tcp(addr.into()))
    }

    /// Use an already-open stream to the bridge.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut wallet = Self::with_endpoint(Endpoint::Attached);
        let conn = wallet.attach(stream);
        *wallet.conn.get_mut() = Some(conn);
        wallet
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_endpoint(endpoint: Endpoint) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            endpoint,
            conn: tokio::sync::Mutex::new(None),
            events,
            next_id: AtomicU64::new(1),
            timeout: REQUEST_TIMEOUT,
        }
    }

    fn attach<S>(&self, stream: S) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            reader,
            pending.clone(),
            self.events.clone(),
            closed.clone(),
        ));
        Connection {
            writer: Box::new(writer),
            pending,
            closed,
            reader,
        }
    }

    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<Connection>,
    ) -> Result<&'a mut Connection> {
        if slot.as_ref().is_some_and(|c| c.closed.load(Ordering::Acquire)) {
            *slot = None;
        }
        if slot.is_none() {
            let stream = match &self.endpoint {
                Endpoint::Tcp(addr) => tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| {
                        DeployError::WalletUnavailable(format!(
                            "cannot reach wallet bridge at {addr}: {e}"
                        ))
                    })?,
                Endpoint::Attached => {
                    return Err(DeployError::WalletUnavailable(
                        "wallet bridge connection closed".into(),
                    ))
                }
            };
            tracing::debug!("connected to wallet bridge");
            *slot = Some(self.attach(stream));
        }
        slot.as_mut()
            .ok_or_else(|| DeployError::WalletUnavailable("wallet bridge not connected".into()))
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let request = BridgeRequest {
            id: id.clone(),
            method,
            params,
        };
        let payload = serde_json::to_vec(&request).map_err(anyhow::Error::from)?;
        if payload.len() > MAX_FRAME_LEN {
            return Err(DeployError::Wallet(format!(
                "'{method}' request is {} bytes, over the {MAX_FRAME_LEN} byte bridge limit",
                payload.len()
            )));
        }

        let (tx, rx) = oneshot::channel();
        let pending = {
            let mut slot = self.conn.lock().await;
            let conn = self.ensure_connected(&mut slot).await?;
            lock(&conn.pending).insert(id.clone(), tx);
            // The reader may have shut down after `ensure_connected` checked.
            if conn.closed.load(Ordering::Acquire) {
                lock(&conn.pending).remove(&id);
                *slot = None;
                return Err(DeployError::WalletUnavailable(
                    "wallet bridge connection closed".into(),
                ));
            }
            if let Err(e) = write_frame(&mut conn.writer, &payload).await {
                *slot = None;
                return Err(DeployError::WalletUnavailable(format!(
                    "failed to write to wallet bridge: {e}"
                )));
            }
            conn.pending.clone()
        };
        tracing::debug!(id = %id, method, "bridge request sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Err(_)) => Err(DeployError::WalletUnavailable(
                "wallet bridge connection closed".into(),
            )),
            Err(_) => {
                lock(&pending).remove(&id);
                Err(DeployError::Wallet(format!(
                    "wallet did not answer '{method}' within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    pending: PendingMap,
    events: broadcast::Sender<WalletEvent>,
    closed: Arc<AtomicBool>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(bytes)) => dispatch(&bytes, &pending, &events),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("wallet bridge read error: {e}");
                break;
            }
        }
    }
    closed.store(true, Ordering::Release);
    // Dropping the senders fails every request still waiting on this connection.
    lock(&pending).clear();
    tracing::debug!("wallet bridge connection closed");
}

fn dispatch(bytes: &[u8], pending: &PendingMap, events: &broadcast::Sender<WalletEvent>) {
    let frame: BridgeFrame = match serde_json::from_slice(bytes) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("ignoring malformed bridge frame: {e}");
            return;
        }
    };
    match frame {
        BridgeFrame::Response(resp) => {
            let Some(tx) = lock(pending).remove(&resp.id) else {
                tracing::debug!(id = %resp.id, "response for unknown request");
                return;
            };
            let reply = match resp.error {
                Some(err) => Err(err),
                None => Ok(resp.result.unwrap_or(serde_json::Value::Null)),
            };
            let _ = tx.send(reply);
        }
        BridgeFrame::Event(ev) => match ev.event.as_str() {
            "keystorechange" => {
                // No subscribers is fine.
                let _ = events.send(WalletEvent::KeystoreChange);
            }
            other => tracing::debug!("ignoring bridge event '{other}'"),
        },
    }
}

#[async_trait]
impl WalletExtension for BridgeWallet {
    async fn enable(&self, chain_id: &str) -> Result<()> {
        self.call("enable", serde_json::json!({ "chainIds": [chain_id] }))
            .await?;
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> Result<WalletAccount> {
        let value = self
            .call("getKey", serde_json::json!({ "chainId": chain_id }))
            .await?;
        let key: KeyResult = serde_json::from_value(value)
            .map_err(|e| DeployError::Wallet(format!("Malformed getKey response: {e}")))?;
        Ok(WalletAccount {
            name: key.name,
            address: key.bech32_address,
            pub_key: decode_b64(&key.pub_key, "pubKey")?,
        })
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        doc: SignDoc,
    ) -> Result<DirectSignResponse> {
        let params = serde_json::json!({
            "chainId": chain_id,
            "signer": signer,
            "signDoc": WireSignDoc::from(&doc),
        });
        let value = self.call("signDirect", params).await?;
        let result: SignDirectResult = serde_json::from_value(value)
            .map_err(|e| DeployError::Wallet(format!("Malformed signDirect response: {e}")))?;
        Ok(DirectSignResponse {
            signed: SignDoc::try_from(result.signed)?,
            signature: decode_b64(&result.signature.signature, "signature")?,
            pub_key: decode_b64(&result.signature.pub_key.value, "pub_key")?,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64, Encoding};
    use tokio::io::DuplexStream;

    /// Read one request from the fake bridge side.
    async fn next_request(stream: &mut DuplexStream) -> serde_json::Value {
        let bytes = read_frame(stream).await.unwrap().expect("request frame");
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn reply(stream: &mut DuplexStream, value: serde_json::Value) {
        write_frame(stream, value.to_string().as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn get_key_round_trip() {
        let (client, mut bridge) = tokio::io::duplex(64 * 1024);
        let wallet = BridgeWallet::from_stream(client);

        let server = tokio::spawn(async move {
            let req = next_request(&mut bridge).await;
            assert_eq!(req["method"], "getKey");
            assert_eq!(req["params"]["chainId"], "uni-6");
            reply(
                &mut bridge,
                serde_json::json!({
                    "id": req["id"],
                    "result": {
                        "name": "alice",
                        "bech32Address": "juno1alice",
                        "pubKey": Base64::encode_string(&[2u8; 33]),
                    }
                }),
            )
            .await;
            bridge
        });

        let account = wallet.get_key("uni-6").await.unwrap();
        assert_eq!(account.name, "alice");
        assert_eq!(account.address, "juno1alice");
        assert_eq!(account.pub_key, vec![2u8; 33]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_maps_to_access_rejected() {
        let (client, mut bridge) = tokio::io::duplex(64 * 1024);
        let wallet = BridgeWallet::from_stream(client);

        let server = tokio::spawn(async move {
            let req = next_request(&mut bridge).await;
            reply(
                &mut bridge,
                serde_json::json!({
                    "id": req["id"],
                    "error": { "code": "rejected", "message": "Request rejected" }
                }),
            )
            .await;
            bridge
        });

        let err = wallet.enable("juno-1").await.unwrap_err();
        assert!(matches!(err, DeployError::AccessRejected(_)), "got {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn keystore_event_is_broadcast() {
        let (client, mut bridge) = tokio::io::duplex(1024);
        let wallet = BridgeWallet::from_stream(client);
        let mut events = wallet.subscribe();

        reply(&mut bridge, serde_json::json!({ "event": "keystorechange" })).await;
        let event = events.recv().await.unwrap();
        assert_eq!(event, WalletEvent::KeystoreChange);
    }

    #[tokio::test]
    async fn closed_bridge_fails_pending_request() {
        let (client, mut bridge) = tokio::io::duplex(1024);
        let wallet = BridgeWallet::from_stream(client);

        let server = tokio::spawn(async move {
            let _ = next_request(&mut bridge).await;
            drop(bridge);
        });

        let err = wallet.get_key("uni-6").await.unwrap_err();
        assert!(matches!(err, DeployError::WalletUnavailable(_)), "got {err:?}");
        server.await.unwrap();

        let err = wallet.get_key("uni-6").await.unwrap_err();
        assert!(matches!(err, DeployError::WalletUnavailable(_)));
    }

    #[tokio::test]
    async fn oversized_request_keeps_connection() {
        let (client, mut bridge) = tokio::io::duplex(64 * 1024);
        let wallet = BridgeWallet::from_stream(client);
        let doc = SignDoc {
            body_bytes: vec![0u8; MAX_FRAME_LEN],
            auth_info_bytes: Vec::new(),
            chain_id: "uni-6".into(),
            account_number: 1,
        };

        let server = tokio::spawn(async move {
            // The oversized request never reaches the bridge.
            let req = next_request(&mut bridge).await;
            assert_eq!(req["method"], "getKey");
            reply(
                &mut bridge,
                serde_json::json!({
                    "id": req["id"],
                    "result": {
                        "name": "alice",
                        "bech32Address": "juno1alice",
                        "pubKey": Base64::encode_string(&[2u8; 33]),
                    }
                }),
            )
            .await;
            bridge
        });

        let err = wallet.sign_direct("uni-6", "juno1alice", doc).await.unwrap_err();
        assert!(matches!(err, DeployError::Wallet(_)), "got {err:?}");

        // Attached streams cannot be re-dialed, so this only works if the
        // connection survived.
        let account = wallet.get_key("uni-6").await.unwrap();
        assert_eq!(account.address, "juno1alice");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_connection_fails_waiters() {
        let (client, _bridge) = tokio::io::duplex(1024);
        let wallet = BridgeWallet::new("127.0.0.1:1");
        let conn = wallet.attach(client);

        let (tx, rx) = oneshot::channel();
        lock(&conn.pending).insert("7".into(), tx);
        drop(conn);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn silent_bridge_times_out() {
        let (client, _bridge) = tokio::io::duplex(1024);
        let wallet = BridgeWallet::from_stream(client).with_timeout(Duration::from_millis(50));

        let err = wallet.enable("uni-6").await.unwrap_err();
        assert!(matches!(err, DeployError::Wallet(_)), "got {err:?}");
        assert!(err.to_string().contains("did not answer 'enable'"));
    }

    #[tokio::test]
    async fn unreachable_tcp_bridge_is_unavailable() {
        // Port 1 on localhost is reserved and normally closed.
        let wallet = BridgeWallet::new("127.0.0.1:1");
        let err = wallet.enable("uni-6").await.unwrap_err();
        assert!(matches!(err, DeployError::WalletUnavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn sign_direct_uses_returned_doc() {
        let (client, mut bridge) = tokio::io::duplex(64 * 1024);
        let wallet = BridgeWallet::from_stream(client);
        let doc = SignDoc {
            body_bytes: vec![1, 2, 3],
            auth_info_bytes: vec![9],
            chain_id: "uni-6".into(),
            account_number: 5,
        };

        let server = tokio::spawn(async move {
            let req = next_request(&mut bridge).await;
            assert_eq!(req["method"], "signDirect");
            assert_eq!(req["params"]["signer"], "juno1alice");
            let mut signed = req["params"]["signDoc"].clone();
            // Wallet bumps the fee, so auth info changes.
            signed["authInfoBytes"] = Base64::encode_string(&[7, 7]).into();
            reply(
                &mut bridge,
                serde_json::json!({
                    "id": req["id"],
                    "result": {
                        "signed": signed,
                        "signature": {
                            "pub_key": { "type": "tendermint/PubKeySecp256k1", "value": Base64::encode_string(&[2u8; 33]) },
                            "signature": Base64::encode_string(&[8u8; 64]),
                        }
                    }
                }),
            )
            .await;
            bridge
        });

        let resp = wallet.sign_direct("uni-6", "juno1alice", doc).await.unwrap();
        assert_eq!(resp.signed.body_bytes, vec![1, 2, 3]);
        assert_eq!(resp.signed.auth_info_bytes, vec![7, 7]);
        assert_eq!(resp.signed.account_number, 5);
        assert_eq!(resp.signature, vec![8u8; 64]);
        server.await.unwrap();
    }
}
