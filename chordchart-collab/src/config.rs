//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Session configuration.
///
/// Deserializable so host applications can embed it in their own settings
/// file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the collaboration server
    pub server_url: String,
    /// First reconnect delay; doubles per failed attempt
    pub reconnect_base_delay_ms: u64,
    /// Upper bound for the reconnect delay
    pub reconnect_max_delay_ms: u64,
    /// Give up after this many consecutive failed attempts (None = retry forever)
    pub max_reconnect_attempts: Option<u32>,
    /// Ping interval while the session is ready
    pub heartbeat_interval_secs: u64,
    /// Treat the link as dead if a ping is not answered in time (None = rely on the transport)
    pub pong_timeout_ms: Option<u64>,
    /// How long received operations stay in the in-memory log
    pub operation_retention_secs: u64,
    /// How often the operation log is pruned
    pub prune_interval_secs: u64,
    /// Re-join the previous room after an automatic reconnect
    pub rejoin_on_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9090".to_string(),
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            max_reconnect_attempts: None,
            heartbeat_interval_secs: 25,
            pong_timeout_ms: None,
            operation_retention_secs: 300,
            prune_interval_secs: 60,
            rejoin_on_reconnect: true,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout_ms.map(Duration::from_millis)
    }

    pub fn operation_retention(&self) -> Duration {
        Duration::from_secs(self.operation_retention_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}
