//! Per-port state machine.
//!
//! A [`Port`] caches one server port's ownership token, operational state
//! and attached streams. Each public operation checks its precondition
//! against the cache first; an illegal request becomes a failing
//! [`CmdResult`] without anything being sent. Otherwise exactly one remote
//! call is made, and the cache is only advanced once the server confirms.
//!
//! # Transitions
//!
//! - `Idle` → `HasStreams` (add stream)
//! - `HasStreams` → `HasStreams` (add stream), `Idle` (last stream removed),
//!   `Transmitting` (start)
//! - `Transmitting`, `Paused` → `HasStreams` (stop)
//! - `Down` → only a sync can leave it
//!
//! A forced stop lands in `HasStreams` from any state but `Down`. Start
//! additionally needs at least one cached stream, whatever the state says.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tgen_core::{CoreError, PortId, PortState};
use tgen_rpc::RpcLink;

use crate::error::Result;
use crate::result::CmdResult;
use crate::types::{Handler, PortSnapshot, StreamDescriptor, StreamId};

/// One remote port.
pub struct Port {
    port_id: PortId,
    user: String,
    handler: Option<Handler>,
    state: PortState,
    streams: BTreeMap<StreamId, StreamDescriptor>,
    link: Arc<dyn RpcLink>,
}

impl Port {
    /// Create an idle, unowned port that sends through `link`.
    #[must_use]
    pub fn new(port_id: PortId, user: impl Into<String>, link: Arc<dyn RpcLink>) -> Self {
        Self {
            port_id,
            user: user.into(),
            handler: None,
            state: PortState::Idle,
            streams: BTreeMap::new(),
            link,
        }
    }

    /// The port's id.
    #[must_use]
    pub const fn id(&self) -> PortId {
        self.port_id
    }

    /// Cached operational state.
    #[must_use]
    pub const fn state(&self) -> PortState {
        self.state
    }

    /// Ownership token, present iff this client holds the port.
    #[must_use]
    pub const fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// Whether this client holds the port.
    #[must_use]
    pub const fn is_acquired(&self) -> bool {
        self.handler.is_some()
    }

    /// Whether traffic is running or paused.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether streams may currently be added.
    #[must_use]
    pub const fn is_writeable(&self) -> bool {
        self.state.is_writeable()
    }

    /// An attached stream.
    #[must_use]
    pub fn stream(&self, stream_id: StreamId) -> Option<&StreamDescriptor> {
        self.streams.get(&stream_id)
    }

    /// All attached streams by id.
    #[must_use]
    pub const fn streams(&self) -> &BTreeMap<StreamId, StreamDescriptor> {
        &self.streams
    }

    /// Ids of the attached streams, ascending.
    #[must_use]
    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.streams.keys().copied().collect()
    }

    fn err(&self, msg: impl std::fmt::Display) -> CmdResult {
        CmdResult::fail(format!("port {} : {msg}", self.port_id))
    }

    fn reject_if_down(&self) -> Option<CmdResult> {
        (self.state == PortState::Down).then(|| self.err("port is down"))
    }

    fn handler_value(&self) -> Value {
        self.handler
            .as_ref()
            .map_or(Value::Null, |h| h.as_value().clone())
    }

    /// Take ownership of the port.
    ///
    /// `force` takes it even from another user.
    pub async fn acquire(&mut self, force: bool) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }

        let params = json!({
            "port_id": self.port_id,
            "user": self.user,
            "force": force,
        });
        let reply = self.link.transmit("acquire", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        let Some(handler) = Handler::from_value(reply.data) else {
            return self.err("malformed acquire reply: no handler");
        };
        self.handler = Some(handler);
        tracing::debug!(port_id = %self.port_id, force, "Acquired port");
        CmdResult::ok()
    }

    /// Give up ownership of the port.
    pub async fn release(&mut self) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }
        if !self.is_acquired() {
            return self.err("port is not acquired");
        }

        let params = json!({
            "port_id": self.port_id,
            "handler": self.handler_value(),
        });
        let reply = self.link.transmit("release", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.handler = None;
        tracing::debug!(port_id = %self.port_id, "Released port");
        CmdResult::ok()
    }

    /// Attach a stream under `stream_id`.
    pub async fn add_stream(&mut self, stream_id: StreamId, stream: StreamDescriptor) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }
        if !self.is_writeable() {
            return self.err("Please stop port before attempting to add streams");
        }

        let params = json!({
            "handler": self.handler_value(),
            "port_id": self.port_id,
            "stream_id": stream_id,
            "stream": stream,
        });
        let reply = self.link.transmit("add_stream", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.streams.insert(stream_id, stream);
        self.state = PortState::HasStreams;
        CmdResult::ok()
    }

    /// Detach the stream `stream_id`.
    pub async fn remove_stream(&mut self, stream_id: StreamId) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }
        if !self.streams.contains_key(&stream_id) {
            return self.err(format!("stream {stream_id} does not exists"));
        }

        let params = json!({
            "handler": self.handler_value(),
            "port_id": self.port_id,
            "stream_id": stream_id,
        });
        let reply = self.link.transmit("remove_stream", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.streams.remove(&stream_id);
        if self.streams.is_empty() && self.state == PortState::HasStreams {
            self.state = PortState::Idle;
        }
        CmdResult::ok()
    }

    /// Detach every stream.
    pub async fn remove_all_streams(&mut self) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }

        let params = json!({
            "handler": self.handler_value(),
            "port_id": self.port_id,
        });
        let reply = self.link.transmit("remove_all_streams", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.streams.clear();
        if self.state == PortState::HasStreams {
            self.state = PortState::Idle;
        }
        CmdResult::ok()
    }

    /// Start transmitting the attached streams at `multiplier`.
    pub async fn start(&mut self, multiplier: f64) -> CmdResult {
        match self.state {
            PortState::Down => return self.err("Unable to start traffic - port is down"),
            PortState::Idle => {
                return self.err("Unable to start traffic - no streams attached to port")
            }
            PortState::Transmitting => {
                return self.err("Unable to start traffic - port is already transmitting")
            }
            PortState::HasStreams | PortState::Paused => {}
        }
        // a forced stop or a stream-less sync can leave the map empty
        if self.streams.is_empty() {
            return self.err("Unable to start traffic - no streams attached to port");
        }

        let params = json!({
            "handler": self.handler_value(),
            "port_id": self.port_id,
            "mul": multiplier,
        });
        let reply = self.link.transmit("start_traffic", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.state = PortState::Transmitting;
        tracing::debug!(port_id = %self.port_id, multiplier, "Started traffic");
        CmdResult::ok()
    }

    /// Stop traffic.
    ///
    /// Without `force` the port must be transmitting or paused. With it the
    /// command is sent regardless of the cached state, and a confirmed stop
    /// always leaves the port in `HasStreams`.
    pub async fn stop(&mut self, force: bool) -> CmdResult {
        if let Some(rejected) = self.reject_if_down() {
            return rejected;
        }
        if !force && !self.is_active() {
            return self.err("port is not transmitting");
        }

        let params = json!({
            "handler": self.handler_value(),
            "port_id": self.port_id,
        });
        let reply = self.link.transmit("stop_traffic", params).await;
        if !reply.success {
            return self.err(reply.message());
        }

        self.state = PortState::HasStreams;
        tracing::debug!(port_id = %self.port_id, force, "Stopped traffic");
        CmdResult::ok()
    }

    /// Overwrite the cache from a server snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownState` if the snapshot's state tag is not
    /// recognized. The port is left untouched in that case.
    pub fn sync(&mut self, snapshot: &PortSnapshot) -> Result<()> {
        let state =
            PortState::from_tag(&snapshot.state).map_err(|source| CoreError::UnknownState {
                port_id: self.port_id,
                source,
            })?;

        self.handler = Handler::from_value(snapshot.handler.clone());
        self.state = state;
        if let Some(streams) = &snapshot.streams {
            self.streams.clone_from(streams);
        }
        if !state.may_hold_streams() {
            self.streams.clear();
        }

        tracing::trace!(
            port_id = %self.port_id,
            state = %state,
            acquired = self.is_acquired(),
            "Synced port"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("port_id", &self.port_id)
            .field("user", &self.user)
            .field("handler", &self.handler)
            .field("state", &self.state)
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgen_rpc::MockServer;

    fn port_on(server: &Arc<MockServer>, id: u32) -> Port {
        let link: Arc<dyn RpcLink> = server.clone();
        Port::new(PortId::new(id), "bob", link)
    }

    fn stream(rate: u32) -> StreamDescriptor {
        StreamDescriptor::new(json!({"rate": rate}))
    }

    fn snapshot(state: &str, handler: Value) -> PortSnapshot {
        PortSnapshot {
            port_id: PortId::new(0),
            handler,
            state: state.to_string(),
            streams: None,
        }
    }

    #[tokio::test]
    async fn acquire_stores_token_and_release_clears_it() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        assert!(port.acquire(false).await.good());
        assert!(port.is_acquired());

        assert!(port.release().await.good());
        assert!(!port.is_acquired());
        assert_eq!(server.count_of("release"), 1);
    }

    #[tokio::test]
    async fn acquire_failure_is_surfaced() {
        let server = Arc::new(MockServer::new(1));
        server.set_owner(0, "alice");
        let mut port = port_on(&server, 0);

        let rc = port.acquire(false).await;
        assert!(rc.bad());
        assert_eq!(rc.err(), vec!["port 0 : port is already owned by 'alice'"]);
        assert!(!port.is_acquired());

        assert!(port.acquire(true).await.good());
        assert!(port.is_acquired());
    }

    #[tokio::test]
    async fn release_without_token_is_local() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        let rc = port.release().await;
        assert_eq!(rc.err(), vec!["port 0 : port is not acquired"]);
        assert_eq!(server.call_count(), 0);
    }

    #[tokio::test]
    async fn add_then_remove_restores_stream_count() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;

        assert!(port.add_stream(1, stream(10)).await.good());
        assert_eq!(port.state(), PortState::HasStreams);
        let before = port.streams().len();

        assert!(port.add_stream(2, stream(20)).await.good());
        assert!(port.remove_stream(2).await.good());
        assert_eq!(port.streams().len(), before);
        assert_eq!(port.state(), PortState::HasStreams);

        assert!(port.remove_stream(1).await.good());
        assert!(port.streams().is_empty());
        assert_eq!(port.state(), PortState::Idle);
    }

    #[tokio::test]
    async fn add_stream_rejected_while_transmitting() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;
        port.add_stream(1, stream(10)).await;
        assert!(port.start(1.0).await.good());

        let calls = server.call_count();
        let rc = port.add_stream(2, stream(20)).await;
        assert_eq!(
            rc.err(),
            vec!["port 0 : Please stop port before attempting to add streams"]
        );
        assert_eq!(server.call_count(), calls);
        assert!(port.stream(2).is_none());
    }

    #[tokio::test]
    async fn failed_add_leaves_port_unchanged() {
        let server = Arc::new(MockServer::new(1));
        server.fail_on("add_stream", Some(0), "stream rejected");
        let mut port = port_on(&server, 0);
        port.acquire(false).await;

        let rc = port.add_stream(1, stream(10)).await;
        assert_eq!(rc.err(), vec!["port 0 : stream rejected"]);
        assert_eq!(port.state(), PortState::Idle);
        assert!(port.streams().is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_stream_is_local() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        let rc = port.remove_stream(9).await;
        assert_eq!(rc.err(), vec!["port 0 : stream 9 does not exists"]);
        assert_eq!(server.call_count(), 0);
    }

    #[tokio::test]
    async fn remove_all_streams_returns_to_idle() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;
        port.add_stream(1, stream(1)).await;
        port.add_stream(2, stream(2)).await;

        assert!(port.remove_all_streams().await.good());
        assert!(port.stream_ids().is_empty());
        assert_eq!(port.state(), PortState::Idle);
    }

    #[tokio::test]
    async fn start_preconditions_are_local() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        let rc = port.start(1.0).await;
        assert_eq!(
            rc.err(),
            vec!["port 0 : Unable to start traffic - no streams attached to port"]
        );

        port.sync(&snapshot("DOWN", Value::Null)).unwrap();
        let rc = port.start(1.0).await;
        assert_eq!(rc.err(), vec!["port 0 : Unable to start traffic - port is down"]);

        port.sync(&snapshot("TX", json!("h-1"))).unwrap();
        let rc = port.start(1.0).await;
        assert_eq!(
            rc.err(),
            vec!["port 0 : Unable to start traffic - port is already transmitting"]
        );

        assert_eq!(server.call_count(), 0);
    }

    #[tokio::test]
    async fn start_and_stop() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;
        port.add_stream(1, stream(10)).await;

        assert!(port.start(2.5).await.good());
        assert_eq!(port.state(), PortState::Transmitting);
        assert!(port.is_active());
        let start = server
            .calls()
            .into_iter()
            .find(|c| c.method == "start_traffic")
            .unwrap();
        assert_eq!(start.params["mul"], 2.5);

        assert!(port.stop(false).await.good());
        assert_eq!(port.state(), PortState::HasStreams);
    }

    #[tokio::test]
    async fn stop_without_force_requires_activity() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        let rc = port.stop(false).await;
        assert_eq!(rc.err(), vec!["port 0 : port is not transmitting"]);
        assert_eq!(server.call_count(), 0);
    }

    #[tokio::test]
    async fn forced_stop_normalizes_state() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;
        assert_eq!(port.state(), PortState::Idle);

        assert!(port.stop(true).await.good());
        assert_eq!(port.state(), PortState::HasStreams);
        assert_eq!(server.count_of("stop_traffic"), 1);
    }

    #[tokio::test]
    async fn start_with_empty_stream_map_is_local() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;

        // forced stop on an idle port
        assert!(port.stop(true).await.good());
        assert_eq!(port.state(), PortState::HasStreams);
        let rc = port.start(1.0).await;
        assert_eq!(
            rc.err(),
            vec!["port 0 : Unable to start traffic - no streams attached to port"]
        );

        // sync that reports streams without carrying them
        let handler = port.handler().unwrap().as_value().clone();
        port.sync(&snapshot("STREAMS", handler)).unwrap();
        assert_eq!(port.state(), PortState::HasStreams);
        assert!(port.streams().is_empty());
        assert!(port.start(1.0).await.bad());

        assert_eq!(server.count_of("start_traffic"), 0);
        assert_eq!(port.state(), PortState::HasStreams);
    }

    #[tokio::test]
    async fn acquire_without_token_fails() {
        let server = Arc::new(MockServer::new(1));
        server.reply_on("acquire", Some(0), Value::Null);
        let mut port = port_on(&server, 0);

        let rc = port.acquire(false).await;
        assert_eq!(rc.err(), vec!["port 0 : malformed acquire reply: no handler"]);
        assert!(!port.is_acquired());

        server.reply_on("acquire", Some(0), json!(""));
        assert!(port.acquire(false).await.bad());
        assert!(!port.is_acquired());
    }

    #[tokio::test]
    async fn paused_port_can_be_stopped_and_started() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.acquire(false).await;
        port.add_stream(1, stream(10)).await;
        let handler = port.handler().unwrap().as_value().clone();
        server.set_state(0, "PAUSE");
        port.sync(&snapshot("PAUSE", handler)).unwrap();

        assert!(port.is_active());
        assert!(port.start(1.0).await.good());
        assert_eq!(port.state(), PortState::Transmitting);
    }

    #[tokio::test]
    async fn down_port_rejects_everything() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.sync(&snapshot("DOWN", json!("h-1"))).unwrap();

        for rc in [
            port.acquire(true).await,
            port.release().await,
            port.add_stream(1, stream(1)).await,
            port.remove_all_streams().await,
            port.stop(true).await,
        ] {
            assert!(rc.bad());
            assert_eq!(rc.err(), vec!["port 0 : port is down"]);
        }
        assert_eq!(server.call_count(), 0);
    }

    #[test]
    fn sync_maps_state_and_token() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        port.sync(&snapshot("TX", json!("h-9"))).unwrap();
        assert_eq!(port.state(), PortState::Transmitting);
        assert_eq!(port.handler().unwrap().as_value(), &json!("h-9"));

        port.sync(&snapshot("IDLE", Value::Null)).unwrap();
        assert_eq!(port.state(), PortState::Idle);
        assert!(!port.is_acquired());
    }

    #[test]
    fn sync_with_unknown_state_changes_nothing() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);
        port.sync(&snapshot("STREAMS", json!("h-1"))).unwrap();

        let err = port.sync(&snapshot("FOO", Value::Null)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "port 0: bad state received from server 'FOO'"
        );
        assert_eq!(port.state(), PortState::HasStreams);
        assert!(port.is_acquired());
    }

    #[test]
    fn sync_replaces_streams_when_present() {
        let server = Arc::new(MockServer::new(1));
        let mut port = port_on(&server, 0);

        let mut snap = snapshot("STREAMS", json!("h-1"));
        snap.streams = Some(BTreeMap::from([(4, stream(4)), (7, stream(7))]));
        port.sync(&snap).unwrap();
        assert_eq!(port.stream_ids(), vec![4, 7]);

        // idle carries no streams
        port.sync(&snapshot("IDLE", json!("h-1"))).unwrap();
        assert!(port.streams().is_empty());
    }
}
