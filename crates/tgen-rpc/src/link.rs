//! The transport link abstraction.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::wire::{RpcCommand, RpcReply};

/// Trait for dispatching commands to the server.
///
/// The link is shared by every port of a client, so all methods take
/// `&self`; implementations keep connection state behind interior
/// mutability. Calls never fail with `Err`: transport and server errors
/// come back as a failing [`RpcReply`].
#[async_trait]
pub trait RpcLink: Send + Sync {
    /// Establish the connection. A no-op when already connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached in time.
    async fn connect(&self) -> Result<()>;

    /// Tear the connection down. Safe to call when not connected.
    async fn disconnect(&self);

    /// Whether calls can currently be issued.
    fn is_connected(&self) -> bool;

    /// Send one command and wait for its correlated reply.
    async fn transmit(&self, method: &str, params: Value) -> RpcReply;

    /// Send a group of commands in one round trip.
    ///
    /// Replies are returned in the order of `batch`.
    async fn transmit_batch(&self, batch: &[RpcCommand]) -> Vec<RpcReply>;

    /// Toggle echoing of wire traffic.
    fn set_verbose(&self, verbose: bool);

    /// Whether wire traffic is echoed.
    fn is_verbose(&self) -> bool;

    /// `host:port` this link talks to.
    fn endpoint(&self) -> String;
}
