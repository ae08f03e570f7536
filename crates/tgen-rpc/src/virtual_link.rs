//! Diagnostic link that never contacts a server.
//!
//! Every call returns the JSON-RPC message that would have been sent, which
//! makes it useful for dry runs and for inspecting exactly what a
//! higher-level operation puts on the wire.
//!
//! The "transmitting virtually" banner is always logged at info level. The
//! message itself is logged at info level only in verbose mode, and at
//! debug level otherwise. Messages are also kept in memory until drained
//! with [`VirtualLink::take_history`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::LinkConfig;
use crate::error::Result;
use crate::link::RpcLink;
use crate::wire::{self, RpcCommand, RpcReply};

/// A link that echoes wire messages instead of sending them.
#[derive(Debug)]
pub struct VirtualLink {
    config: LinkConfig,
    verbose: AtomicBool,
    next_id: AtomicU64,
    history: Mutex<Vec<String>>,
}

impl VirtualLink {
    /// Create a new virtual link.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            verbose: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Wire messages produced since the last drain, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    /// Remove and return the recorded wire messages.
    pub fn take_history(&self) -> Vec<String> {
        std::mem::take(&mut *self.history.lock())
    }

    fn prompt(&self) {
        tracing::info!(
            "Transmitting virtually over tcp://{}:{}",
            self.config.server,
            self.config.sync_port
        );
    }

    fn record(&self, message: String) -> String {
        if self.is_verbose() {
            tracing::info!("{message}");
        } else {
            tracing::debug!("{message}");
        }
        self.history.lock().push(message.clone());
        message
    }
}

#[async_trait]
impl RpcLink for VirtualLink {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn transmit(&self, method: &str, params: Value) -> RpcReply {
        self.prompt();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = wire::request(id, method, &params).to_string();
        RpcReply::ok(Value::String(self.record(message)))
    }

    async fn transmit_batch(&self, batch: &[RpcCommand]) -> Vec<RpcReply> {
        self.prompt();
        batch
            .iter()
            .map(|cmd| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let message = wire::request(id, &cmd.method, &cmd.params).to_string();
                RpcReply::ok(Value::String(self.record(message)))
            })
            .collect()
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn echoes_wire_message() {
        let link = VirtualLink::new(LinkConfig::default());
        link.connect().await.unwrap();
        assert!(link.is_connected());

        let reply = link
            .transmit("acquire", json!({"port_id": 0, "user": "bob", "force": false}))
            .await;
        assert!(reply.success);

        let echoed: Value = serde_json::from_str(&reply.message()).unwrap();
        assert_eq!(echoed["method"], "acquire");
        assert_eq!(echoed["params"]["user"], "bob");
        assert_eq!(echoed["id"], 1);
    }

    #[tokio::test]
    async fn ids_are_deterministic() {
        let link = VirtualLink::new(LinkConfig::default());
        link.transmit("ping", json!({})).await;
        let replies = link
            .transmit_batch(&[
                RpcCommand::new("ping", json!({})),
                RpcCommand::new("get_system_info", json!({})),
            ])
            .await;
        assert_eq!(replies.len(), 2);

        let history = link.history();
        assert_eq!(history.len(), 3);
        let last: Value = serde_json::from_str(&history[2]).unwrap();
        assert_eq!(last["id"], 3);
        assert_eq!(last["method"], "get_system_info");
    }

    #[tokio::test]
    async fn history_can_be_drained() {
        let link = VirtualLink::new(LinkConfig::default());
        link.set_verbose(true);
        assert!(link.is_verbose());

        link.transmit("ping", json!({})).await;
        link.transmit("ping", json!({})).await;

        let drained = link.take_history();
        assert_eq!(drained.len(), 2);
        assert!(link.history().is_empty());

        link.transmit("ping", json!({})).await;
        let last: Value = serde_json::from_str(&link.history()[0]).unwrap();
        assert_eq!(last["id"], 3);
    }

    #[tokio::test]
    async fn disconnect_is_noop() {
        let link = VirtualLink::new(LinkConfig::default());
        link.disconnect().await;
        assert!(link.is_connected());
    }
}
