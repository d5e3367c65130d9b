/// Wallet bridge protocol: 4-byte LE length-prefixed JSON frames.
///
/// The deployer sends requests, the bridge answers them by id and pushes
/// unsolicited events (account changes) on the same stream.
use std::io;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::client::proto::SignDoc;
use crate::error::DeployError;

/// Upper bound for one frame. Sign requests carry the whole (compressed)
/// contract binary, base64 encoded.
pub(crate) const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

// -- Protocol types --

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BridgeRequest<'a> {
    pub(crate) id: String,
    pub(crate) method: &'a str,
    pub(crate) params: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum BridgeFrame {
    Response(BridgeResponse),
    Event(BridgeEvent),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeResponse {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) result: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) error: Option<BridgeError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeEvent {
    pub(crate) event: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BridgeError {
    pub(crate) code: String,
    pub(crate) message: String,
}

impl From<BridgeError> for DeployError {
    fn from(e: BridgeError) -> Self {
        match e.code.as_str() {
            "rejected" | "denied" => DeployError::AccessRejected(e.message),
            "unavailable" | "locked" => DeployError::WalletUnavailable(e.message),
            _ => DeployError::Wallet(format!("{} ({})", e.message, e.code)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KeyResult {
    pub(crate) name: String,
    pub(crate) bech32_address: String,
    pub(crate) pub_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSignDoc {
    pub(crate) body_bytes: String,
    pub(crate) auth_info_bytes: String,
    pub(crate) chain_id: String,
    pub(crate) account_number: String,
}

impl From<&SignDoc> for WireSignDoc {
    fn from(doc: &SignDoc) -> Self {
        Self {
            body_bytes: Base64::encode_string(&doc.body_bytes),
            auth_info_bytes: Base64::encode_string(&doc.auth_info_bytes),
            chain_id: doc.chain_id.clone(),
            account_number: doc.account_number.to_string(),
        }
    }
}

impl TryFrom<WireSignDoc> for SignDoc {
    type Error = anyhow::Error;

    fn try_from(doc: WireSignDoc) -> anyhow::Result<Self> {
        Ok(SignDoc {
            body_bytes: decode_b64(&doc.body_bytes, "bodyBytes")?,
            auth_info_bytes: decode_b64(&doc.auth_info_bytes, "authInfoBytes")?,
            chain_id: doc.chain_id,
            account_number: doc
                .account_number
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid accountNumber '{}'", doc.account_number))?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignDirectResult {
    pub(crate) signed: WireSignDoc,
    pub(crate) signature: StdSignature,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StdSignature {
    pub(crate) pub_key: WirePubKey,
    pub(crate) signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WirePubKey {
    pub(crate) value: String,
}

pub(crate) fn decode_b64(value: &str, field: &str) -> anyhow::Result<Vec<u8>> {
    Base64::decode_vec(value).map_err(|e| anyhow::anyhow!("Invalid base64 in {field}: {e}"))
}

// -- Wire format IO --

/// Read one frame from `reader`.
/// Returns `Ok(None)` on clean EOF (bridge closed the stream).
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid bridge frame length: {len}"),
        ));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Write one frame to `writer`.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    payload: &[u8],
) -> io::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Bridge frame too large: {} bytes", payload.len()),
        ));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}
