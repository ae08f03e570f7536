//! Query surface for asynchronous telemetry.
//!
//! Statistics arrive on a separate channel that this crate does not
//! subscribe to. Whatever does the subscribing publishes the latest
//! snapshot into a [`TelemetrySource`], and the client only reads it.

use parking_lot::RwLock;
use serde_json::Value;

/// Provider of the most recent telemetry snapshot.
pub trait TelemetrySource: Send + Sync {
    /// The latest snapshot, if one has been received.
    fn latest(&self) -> Option<Value>;
}

/// Source that never has data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl TelemetrySource for NullTelemetry {
    fn latest(&self) -> Option<Value> {
        None
    }
}

/// Source fed by an external subscriber.
#[derive(Debug, Default)]
pub struct SharedTelemetry {
    latest: RwLock<Option<Value>>,
}

impl SharedTelemetry {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest snapshot.
    pub fn publish(&self, snapshot: Value) {
        *self.latest.write() = Some(snapshot);
    }
}

impl TelemetrySource for SharedTelemetry {
    fn latest(&self) -> Option<Value> {
        self.latest.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_source_is_empty() {
        assert!(NullTelemetry.latest().is_none());
    }

    #[test]
    fn shared_source_returns_latest() {
        let source = SharedTelemetry::new();
        assert!(source.latest().is_none());
        source.publish(json!({"tx_pps": 10}));
        source.publish(json!({"tx_pps": 20}));
        assert_eq!(source.latest(), Some(json!({"tx_pps": 20})));
    }
}
