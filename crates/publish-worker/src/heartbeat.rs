//! Loop liveness tracking for the health endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use publish_core::types::time::{duration_nanos, now_nanos};

/// Last time a loop completed an iteration, in epoch nanoseconds.
#[derive(Debug)]
pub struct Heartbeat {
    name: &'static str,
    last: AtomicI64,
}

impl Heartbeat {
    /// Create a heartbeat that counts as fresh from now.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            last: AtomicI64::new(now_nanos()),
        }
    }

    /// Name of the loop.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Record an iteration at the current time.
    pub fn beat(&self) {
        self.beat_at(now_nanos());
    }

    /// Record an iteration at `now`.
    pub fn beat_at(&self, now: i64) {
        self.last.fetch_max(now, Ordering::SeqCst);
    }

    /// Time of the last iteration.
    pub fn last_beat(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }

    /// Whether the loop has iterated within `grace` of `now`.
    pub fn is_fresh(&self, now: i64, grace: Duration) -> bool {
        now.saturating_sub(self.last_beat()) <= duration_nanos(grace)
    }
}

/// Heartbeats of the two ticking loops.
#[derive(Debug, Clone)]
pub struct Liveness {
    /// Claim poller.
    pub poller: Arc<Heartbeat>,
    /// Completion reaper.
    pub reaper: Arc<Heartbeat>,
}

impl Liveness {
    /// Fresh heartbeats for both loops.
    pub fn new() -> Self {
        Self {
            poller: Arc::new(Heartbeat::new("claim_poller")),
            reaper: Arc::new(Heartbeat::new("completion_reaper")),
        }
    }

    /// Name the first loop that has not iterated within `grace`.
    pub fn check(&self, now: i64, grace: Duration) -> Result<(), String> {
        for heartbeat in [&self.poller, &self.reaper] {
            if !heartbeat.is_fresh(now, grace) {
                return Err(format!("{} has not ticked within {grace:?}", heartbeat.name()));
            }
        }
        Ok(())
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
