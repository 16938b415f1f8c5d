//! Completion tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for acknowledgement handling and the completion reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Interval in milliseconds between reap scans.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,
    /// Maximum acknowledgements being written concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight_acks: usize,
}

impl TrackerConfig {
    /// Reap tick interval.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reap_interval_ms: default_reap_interval(),
            max_in_flight_acks: default_max_in_flight(),
        }
    }
}

fn default_reap_interval() -> u64 {
    260
}

fn default_max_in_flight() -> usize {
    40
}
