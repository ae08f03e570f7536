//! In-memory stand-in for a traffic-generation server.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::Result;
use crate::link::RpcLink;
use crate::wire::{RpcCommand, RpcReply};

const SUPPORTED: &[&str] = &[
    "get_system_info",
    "get_supported_cmds",
    "sync_user",
    "acquire",
    "release",
    "add_stream",
    "remove_stream",
    "remove_all_streams",
    "start_traffic",
    "stop_traffic",
    "ping",
];

#[derive(Debug, Clone)]
struct MockPort {
    owner: Option<String>,
    handler: Option<String>,
    state: String,
    streams: BTreeMap<u64, Value>,
}

impl MockPort {
    fn new() -> Self {
        Self {
            owner: None,
            handler: None,
            state: "IDLE".to_string(),
            streams: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    ports: Vec<MockPort>,
    calls: Vec<RpcCommand>,
    failures: HashMap<(String, Option<u64>), String>,
    replies: HashMap<(String, Option<u64>), Value>,
    next_handler: u64,
}

/// A link backed by a simulated server.
///
/// The simulation enforces ownership by handler and the basic stream and
/// traffic rules, so it rejects commands the way a real server would.
/// Failures can also be injected per method and port.
#[derive(Debug)]
pub struct MockServer {
    inner: Mutex<Inner>,
    connected: AtomicBool,
    verbose: AtomicBool,
}

impl MockServer {
    /// Create a server exposing `port_count` idle, unowned ports.
    #[must_use]
    pub fn new(port_count: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ports: vec![MockPort::new(); port_count],
                ..Inner::default()
            }),
            connected: AtomicBool::new(false),
            verbose: AtomicBool::new(false),
        }
    }

    /// Make `method` fail with `message`, for one port or (with `None`) for
    /// every call of that method.
    pub fn fail_on(&self, method: &str, port_id: Option<u64>, message: &str) {
        self.inner
            .lock()
            .failures
            .insert((method.to_string(), port_id), message.to_string());
    }

    /// Make `method` succeed with `data` without touching the simulation,
    /// for one port or (with `None`) for every call of that method.
    pub fn reply_on(&self, method: &str, port_id: Option<u64>, data: Value) {
        self.inner
            .lock()
            .replies
            .insert((method.to_string(), port_id), data);
    }

    /// Remove every injected failure and canned reply.
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failures.clear();
        inner.replies.clear();
    }

    /// Overwrite a port's server-side state tag. Any string is accepted.
    pub fn set_state(&self, port_id: usize, tag: &str) {
        if let Some(port) = self.inner.lock().ports.get_mut(port_id) {
            port.state = tag.to_string();
        }
    }

    /// Give a port to another user.
    pub fn set_owner(&self, port_id: usize, owner: &str) {
        let mut inner = self.inner.lock();
        inner.next_handler += 1;
        let handler = format!("h-{}", inner.next_handler);
        if let Some(port) = inner.ports.get_mut(port_id) {
            port.owner = Some(owner.to_string());
            port.handler = Some(handler);
        }
    }

    /// A port's server-side state tag.
    #[must_use]
    pub fn state(&self, port_id: usize) -> Option<String> {
        self.inner.lock().ports.get(port_id).map(|p| p.state.clone())
    }

    /// Number of streams the server holds for a port.
    #[must_use]
    pub fn stream_count(&self, port_id: usize) -> usize {
        self.inner
            .lock()
            .ports
            .get(port_id)
            .map_or(0, |p| p.streams.len())
    }

    /// Every command received, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RpcCommand> {
        self.inner.lock().calls.clone()
    }

    /// Number of commands received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Number of times `method` was received.
    #[must_use]
    pub fn count_of(&self, method: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn handle(&self, method: &str, params: &Value) -> RpcReply {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(RpcCommand::new(method, params.clone()));

        let port_id = params.get("port_id").and_then(Value::as_u64);
        for key in [(method.to_string(), port_id), (method.to_string(), None)] {
            if let Some(message) = inner.failures.get(&key) {
                return RpcReply::fail(message.clone());
            }
        }
        for key in [(method.to_string(), port_id), (method.to_string(), None)] {
            if let Some(data) = inner.replies.get(&key) {
                return RpcReply::ok(data.clone());
            }
        }

        match method {
            "ping" => RpcReply::ok(json!("ACK")),
            "get_system_info" => RpcReply::ok(json!({
                "port_count": inner.ports.len(),
                "version": "mock-1.0",
                "hostname": "mock-server",
            })),
            "get_supported_cmds" => RpcReply::ok(json!(SUPPORTED)),
            "sync_user" => Self::sync_user(&inner, params),
            _ => Self::port_command(&mut inner, method, params, port_id),
        }
    }

    fn sync_user(inner: &Inner, params: &Value) -> RpcReply {
        let user = params.get("user").and_then(Value::as_str);
        let sync_streams = params
            .get("sync_streams")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let snapshots: Vec<Value> = inner
            .ports
            .iter()
            .enumerate()
            .map(|(id, port)| {
                let handler = if port.owner.as_deref() == user {
                    json!(port.handler)
                } else {
                    Value::Null
                };
                let mut snapshot = json!({
                    "port_id": id,
                    "handler": handler,
                    "state": port.state,
                });
                if sync_streams {
                    let streams: serde_json::Map<String, Value> = port
                        .streams
                        .iter()
                        .map(|(id, s)| (id.to_string(), s.clone()))
                        .collect();
                    snapshot["streams"] = Value::Object(streams);
                }
                snapshot
            })
            .collect();

        RpcReply::ok(Value::Array(snapshots))
    }

    fn port_command(
        inner: &mut Inner,
        method: &str,
        params: &Value,
        port_id: Option<u64>,
    ) -> RpcReply {
        if !SUPPORTED.contains(&method) {
            return RpcReply::fail(format!("method '{method}' not supported"));
        }

        let Some(index) = port_id.and_then(|id| usize::try_from(id).ok()) else {
            return RpcReply::fail("missing or invalid 'port_id'");
        };
        if index >= inner.ports.len() {
            return RpcReply::fail(format!("invalid port id {index}"));
        }

        if method == "acquire" {
            let user = params.get("user").and_then(Value::as_str).unwrap_or_default();
            let force = params.get("force").and_then(Value::as_bool).unwrap_or(false);
            let port = &inner.ports[index];
            if let Some(owner) = &port.owner {
                if owner != user && !force {
                    return RpcReply::fail(format!("port is already owned by '{owner}'"));
                }
            }
            inner.next_handler += 1;
            let handler = format!("h-{}", inner.next_handler);
            let port = &mut inner.ports[index];
            port.owner = Some(user.to_string());
            port.handler = Some(handler.clone());
            return RpcReply::ok(json!(handler));
        }

        let port = &mut inner.ports[index];
        let handler = params.get("handler").and_then(Value::as_str);
        if handler.is_none() || handler != port.handler.as_deref() {
            return RpcReply::fail("invalid handler");
        }

        match method {
            "release" => {
                port.owner = None;
                port.handler = None;
                RpcReply::ok(json!("ACK"))
            }
            "add_stream" => {
                if !matches!(port.state.as_str(), "IDLE" | "STREAMS") {
                    return RpcReply::fail("port is active");
                }
                let Some(stream_id) = params.get("stream_id").and_then(Value::as_u64) else {
                    return RpcReply::fail("missing 'stream_id'");
                };
                let stream = params.get("stream").cloned().unwrap_or(Value::Null);
                port.streams.insert(stream_id, stream);
                port.state = "STREAMS".to_string();
                RpcReply::ok(json!("ACK"))
            }
            "remove_stream" => {
                let stream_id = params.get("stream_id").and_then(Value::as_u64);
                match stream_id.and_then(|id| port.streams.remove(&id)) {
                    Some(_) => {
                        if port.streams.is_empty() && port.state == "STREAMS" {
                            port.state = "IDLE".to_string();
                        }
                        RpcReply::ok(json!("ACK"))
                    }
                    None => RpcReply::fail("stream does not exist"),
                }
            }
            "remove_all_streams" => {
                if matches!(port.state.as_str(), "TX" | "PAUSE") {
                    return RpcReply::fail("cannot remove streams while port is active");
                }
                port.streams.clear();
                if port.state == "STREAMS" {
                    port.state = "IDLE".to_string();
                }
                RpcReply::ok(json!("ACK"))
            }
            "start_traffic" => {
                if !matches!(port.state.as_str(), "STREAMS" | "PAUSE") {
                    return RpcReply::fail(format!("cannot start traffic in state {}", port.state));
                }
                port.state = "TX".to_string();
                RpcReply::ok(json!("ACK"))
            }
            "stop_traffic" => {
                if matches!(port.state.as_str(), "TX" | "PAUSE") {
                    port.state = "STREAMS".to_string();
                }
                RpcReply::ok(json!("ACK"))
            }
            _ => RpcReply::fail(format!("method '{method}' not supported")),
        }
    }
}

#[async_trait]
impl RpcLink for MockServer {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn transmit(&self, method: &str, params: Value) -> RpcReply {
        self.handle(method, &params)
    }

    async fn transmit_batch(&self, batch: &[RpcCommand]) -> Vec<RpcReply> {
        batch
            .iter()
            .map(|cmd| self.handle(&cmd.method, &cmd.params))
            .collect()
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}
