//! Error types for the transport link.

use std::time::Duration;

use thiserror::Error;

/// A result type using `LinkError`.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised while talking to the server.
///
/// Inside a call these never escape as `Err`: the link folds them into a
/// failing [`RpcReply`](crate::RpcReply) carrying the message. Only
/// `connect` reports them directly.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A call was issued before `connect` succeeded, or after the
    /// connection was dropped.
    #[error("not connected to server")]
    NotConnected,

    /// The TCP connection could not be established.
    #[error("unable to connect to {endpoint}: {source}")]
    Connect {
        /// The `host:port` we tried.
        endpoint: String,
        /// The underlying socket error.
        source: std::io::Error,
    },

    /// The TCP connection was not established in time.
    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout {
        /// The `host:port` we tried.
        endpoint: String,
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// No response arrived within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// Socket I/O failed mid-call.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Returns true if the connection is unusable after this error.
    #[must_use]
    pub const fn drops_connection(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Closed | Self::Io(_) | Self::Json(_)
        )
    }
}
