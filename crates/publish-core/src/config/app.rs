//! HTTP server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Health/status HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Whether to serve HTTP at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How stale a loop heartbeat may get before health reports an error.
    #[serde(default = "default_liveness_grace")]
    pub liveness_grace_ms: u64,
}

impl ServerConfig {
    /// `host:port` bind string.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat staleness limit.
    pub fn liveness_grace(&self) -> Duration {
        Duration::from_millis(self.liveness_grace_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
            liveness_grace_ms: default_liveness_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_liveness_grace() -> u64 {
    10_000
}
