//! Data exchanged with the server and client configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tgen_core::PortId;
use tgen_rpc::LinkConfig;

use crate::error::Result;

/// Identifier of a stream within one port.
pub type StreamId = u32;

/// Opaque authorization token returned by `acquire`.
///
/// The client never interprets it; it is sent back verbatim with every
/// write command on the port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handler(Value);

impl Handler {
    /// Wrap a token as received from the server.
    ///
    /// Returns `None` for the "no owner" encodings: `null` or an empty string.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match &value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            _ => Some(Self(value)),
        }
    }

    /// The token as it goes on the wire.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Opaque traffic-pattern descriptor produced by an external packet builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamDescriptor(Value);

impl StreamDescriptor {
    /// Wrap a serialized stream.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// The serialized stream.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// A stream together with the id it is attached under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPack {
    /// Stream id, unique per port.
    pub stream_id: StreamId,
    /// The stream itself.
    pub stream: StreamDescriptor,
}

impl StreamPack {
    /// Create a new pack.
    #[must_use]
    pub const fn new(stream_id: StreamId, stream: StreamDescriptor) -> Self {
        Self { stream_id, stream }
    }

    /// Load a JSON array of `{stream_id, stream}` objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not such an array.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Server description returned by `get_system_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Number of ports; ports are numbered `0..port_count`.
    pub port_count: u32,
    /// Server software version, when reported.
    #[serde(default)]
    pub version: Option<String>,
    /// Everything else the server reports.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Server-side view of one port, as returned by `sync_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSnapshot {
    /// The port described.
    pub port_id: PortId,
    /// This user's token for the port; null or empty when not owned.
    #[serde(default)]
    pub handler: Value,
    /// Raw state tag; mapped to a state by the port itself.
    pub state: String,
    /// Attached streams, present only when streams were requested.
    #[serde(default)]
    pub streams: Option<BTreeMap<StreamId, StreamDescriptor>>,
}

/// Configuration for a [`StatelessClient`](crate::StatelessClient).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Identity ports are acquired under.
    pub user: String,
    /// Transport settings.
    #[serde(default)]
    pub link: LinkConfig,
    /// Take ports from other users during `connect`.
    #[serde(default)]
    pub force_acquire_on_connect: bool,
    /// Ask the server for attached streams during `connect`.
    #[serde(default)]
    pub sync_streams_on_connect: bool,
}

impl ClientConfig {
    /// Create a config for `user` with default link settings.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            link: LinkConfig::default(),
            force_acquire_on_connect: false,
            sync_streams_on_connect: false,
        }
    }

    /// Replace the link settings.
    #[must_use]
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }
}
