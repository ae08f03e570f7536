//! Link configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for a transport link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Server host name or address.
    #[serde(default = "LinkConfig::default_server")]
    pub server: String,

    /// Port of the synchronous RPC channel.
    #[serde(default = "LinkConfig::default_sync_port")]
    pub sync_port: u16,

    /// Port of the asynchronous telemetry channel.
    #[serde(default = "LinkConfig::default_async_port")]
    pub async_port: u16,

    /// Dry-run mode: echo wire messages instead of sending them.
    #[serde(default)]
    pub virtual_mode: bool,

    /// Echo wire traffic to the log.
    #[serde(default)]
    pub verbose: bool,

    /// Per-call timeout in seconds.
    #[serde(default = "LinkConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connection establishment timeout in seconds.
    #[serde(default = "LinkConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl LinkConfig {
    fn default_server() -> String {
        "localhost".to_string()
    }

    const fn default_sync_port() -> u16 {
        5050
    }

    const fn default_async_port() -> u16 {
        4500
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Create a config for the given server with default ports.
    #[must_use]
    pub fn new(server: impl Into<String>, sync_port: u16) -> Self {
        Self {
            server: server.into(),
            sync_port,
            ..Self::default()
        }
    }

    /// `host:port` of the synchronous RPC channel.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server, self.sync_port)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            server: Self::default_server(),
            sync_port: Self::default_sync_port(),
            async_port: Self::default_async_port(),
            virtual_mode: false,
            verbose: false,
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.server, "localhost");
        assert_eq!(config.sync_port, 5050);
        assert_eq!(config.async_port, 4500);
        assert!(!config.virtual_mode);
        assert_eq!(config.endpoint(), "localhost:5050");
    }

    #[test]
    fn timeout_duration() {
        let config = LinkConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"server": "trex-01", "virtual_mode": true}"#).unwrap();
        assert_eq!(config.server, "trex-01");
        assert!(config.virtual_mode);
        assert_eq!(config.sync_port, 5050);
        assert_eq!(config.request_timeout_seconds, 30);
    }
}
