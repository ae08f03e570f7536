//! Transport link for the tgen control client.
//!
//! A link turns "send one named command with parameters" into a structured
//! [`RpcReply`]. It hides whether the underlying channel is a real server
//! connection or a diagnostic dry run:
//!
//! - [`JsonRpcLink`]: JSON-RPC 2.0 over TCP, one request in flight at a time,
//!   bounded by a per-call timeout
//! - [`VirtualLink`]: never touches the network; echoes the would-be wire
//!   message back as the reply payload
//!
//! Both implement [`RpcLink`], which is what the control layer holds.
//!
//! # Testing
//!
//! For testing without a real server, enable the `test-utils` feature and
//! use [`MockServer`](mock::MockServer), an in-memory simulation of the
//! server's port bookkeeping that also records every call it receives.
//!
//! # Usage
//!
//! ```no_run
//! use serde_json::json;
//! use tgen_rpc::{build_link, LinkConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let link = build_link(&LinkConfig::default());
//! link.connect().await?;
//!
//! let reply = link.transmit("ping", json!({})).await;
//! assert!(reply.success);
//!
//! link.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod link;
pub mod virtual_link;
pub mod wire;

use std::sync::Arc;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use jsonrpc::JsonRpcLink;
pub use link::RpcLink;
pub use virtual_link::VirtualLink;
pub use wire::{RpcCommand, RpcReply};

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockServer;

/// Build the link selected by `config.virtual_mode`.
#[must_use]
pub fn build_link(config: &LinkConfig) -> Arc<dyn RpcLink> {
    let link: Arc<dyn RpcLink> = if config.virtual_mode {
        Arc::new(VirtualLink::new(config.clone()))
    } else {
        Arc::new(JsonRpcLink::new(config.clone()))
    };
    link.set_verbose(config.verbose);
    link
}
