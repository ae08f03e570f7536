//! Error types for the control layer.
//!
//! Expected failures (a port refusing a command locally, the server
//! rejecting it, the transport dropping) are not errors here: they come back
//! as a failing [`CmdResult`](crate::CmdResult). `ClientError` is reserved
//! for input that is rejected before anything is sent and for server data
//! the client cannot make sense of.

use tgen_core::CoreError;
use thiserror::Error;

/// A result type using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that abort a client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Port selection or port state validation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A successful reply did not have the expected shape.
    #[error("malformed reply to '{method}': {reason}")]
    MalformedReply {
        /// The method whose reply was malformed.
        method: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Reading a stream file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stream file was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true if repeating the whole operation might succeed.
    ///
    /// A malformed reply can be a transient server hiccup; a bad selector or
    /// an unknown state tag will fail the same way again.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::MalformedReply { .. } | Self::Io(_))
    }
}
