//! Common error types for tgen.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

use crate::ids::PortId;
use crate::state::ParseStateError;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the tgen client.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A port index outside of the server's port range was supplied.
    #[error("bad port id {port_id}: server has {port_count} ports")]
    PortOutOfRange {
        /// The offending port.
        port_id: PortId,
        /// Number of ports reported by the server.
        port_count: usize,
    },

    /// The server reported a port state this client does not know.
    #[error("port {port_id}: {source}")]
    UnknownState {
        /// The port whose snapshot carried the tag.
        port_id: PortId,
        /// The parse failure.
        #[source]
        source: ParseStateError,
    },
}
