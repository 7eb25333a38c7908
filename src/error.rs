use thiserror::Error;

/// WebSocket error type.
#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
pub use async_tungstenite::tungstenite::Error as WsError;

/// A result type that wraps up the DDP client errors.
pub type Result<T, E = DdpError> = std::result::Result<T, E>;

/// Error returned by the server on a `result` message that carries an
/// `error` field instead of (or alongside) `result`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MethodError {
    /// Server-supplied error code, e.g. `400`.
    pub error: serde_json::Value,
    /// Short machine-readable reason string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error type, when the server tags one.
    #[serde(
        default,
        rename = "errorType",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_type: Option<String>,
    /// Additional server-supplied detail payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for MethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method error {}", self.error)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        Ok(())
    }
}

/// The error type for the DDP client.
///
/// This consolidates what the teacher tracked as two parallel enums
/// (`WsClientError`/`RpcClientError`) into one taxonomy, since the DDP
/// client has a single transport kind.
#[derive(Debug, Error)]
pub enum DdpError {
    /// The underlying transport failed (socket error, handshake failure,
    /// send-while-disconnected, ...). Carries a message rather than the
    /// WS crate's own error type so `Transport` stays available
    /// regardless of which runtime feature is compiled in.
    #[error("transport error: {0}")]
    Transport(String),

    /// A `call`/`subscribe`/`unsubscribe` was attempted while the session
    /// was not `OPEN`.
    #[error("not connected")]
    NotConnected,

    /// The server rejected every version this client supports, or version
    /// negotiation cycled back to an already-tried version.
    #[error("version negotiation failed")]
    VersionNegotiation,

    /// The operation's deadline elapsed before it completed.
    #[error("operation timed out")]
    Timeout,

    /// The operation was aborted by `close()`.
    #[error("operation cancelled")]
    Cancelled,

    /// The connection dropped while the operation was outstanding.
    #[error("connection lost")]
    ConnectionLost,

    /// The server returned `error` on a `result` message.
    #[error(transparent)]
    Method(#[from] MethodError),

    /// The subscription was terminated by a `nosub` message.
    #[error("subscription rejected: {0:?}")]
    NoSub(Option<serde_json::Value>),

    /// JSON (de)serialization of a value the caller asked for failed.
    ///
    /// Malformed frames and unrecognized `msg` kinds never reach this
    /// point; they are dropped at the codec/router boundary (spec §7's
    /// `DecodeError` is intentionally not surfaced). This variant is for
    /// payload values (e.g. a `result.result`) that don't deserialize into
    /// the type the caller requested.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background dispatcher task is gone (its channel disconnected).
    #[error("internal dispatcher channel closed")]
    InternalChannel,
}

#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
impl From<WsError> for DdpError {
    fn from(err: WsError) -> Self {
        DdpError::Transport(err.to_string())
    }
}
