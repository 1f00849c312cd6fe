//! Connection settings for the JSON-RPC transport.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a WebSocket JSON-RPC connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// WebSocket URL (`wss://...`)
    pub ws_url: String,
    /// Per-request timeout (ms)
    pub request_timeout_ms: u64,
    /// Ping interval to keep connection alive (ms)
    pub ping_interval_ms: u64,
    /// How long to wait for a PONG before treating the connection as dead (ms)
    pub pong_timeout_ms: u64,
    /// Connection timeout (ms)
    pub connect_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            request_timeout_ms: 15_000,
            ping_interval_ms: 20_000,
            pong_timeout_ms: 20_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl RpcConfig {
    /// Default settings for an endpoint.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RpcConfig::new("wss://example.org/ws");
        assert_eq!(config.ws_url, "wss://example.org/ws");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.ping_interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RpcConfig =
            serde_json::from_str(r#"{"ws_url":"wss://x","request_timeout_ms":500}"#).unwrap();
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }
}
