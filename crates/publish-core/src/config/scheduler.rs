//! Claim poller and dispatch configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the claim poller and the dispatch pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval in milliseconds between claim ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum jobs claimed per tick (0 = unbounded).
    #[serde(default = "default_max_launch")]
    pub max_launch_per_tick: u32,
    /// Seconds without item progress after which a started job is
    /// re-claimed (0 = restart recovery disabled). Claimed jobs that never
    /// reached the dispatcher are only recovered this way.
    #[serde(default = "default_restart_gap")]
    pub restart_gap_seconds: u64,
    /// Number of claimed jobs being dispatched concurrently.
    #[serde(default = "default_dispatch_concurrency")]
    pub max_concurrent_dispatches: usize,
    /// Capacity of the channel between the poller and the dispatch pool.
    #[serde(default = "default_queue_capacity")]
    pub dispatch_queue_capacity: usize,
}

impl SchedulerConfig {
    /// Claim tick interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Restart gap, or `None` when restart recovery is disabled.
    pub fn restart_gap(&self) -> Option<Duration> {
        (self.restart_gap_seconds > 0).then(|| Duration::from_secs(self.restart_gap_seconds))
    }

    /// Per-tick claim cap, or `None` when unbounded.
    pub fn launch_limit(&self) -> Option<u32> {
        (self.max_launch_per_tick > 0).then_some(self.max_launch_per_tick)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_launch_per_tick: default_max_launch(),
            restart_gap_seconds: default_restart_gap(),
            max_concurrent_dispatches: default_dispatch_concurrency(),
            dispatch_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_poll_interval() -> u64 {
    330
}

fn default_max_launch() -> u32 {
    20
}

fn default_restart_gap() -> u64 {
    300
}

fn default_dispatch_concurrency() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    32
}
