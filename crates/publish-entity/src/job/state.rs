//! Job lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a persisted job.
///
/// Not stored: it is derived from `start_time` and `complete_time`.
/// Cancelled jobs are deleted, so they have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Admitted, waiting for its schedule time.
    Scheduled,
    /// Claimed by the poller and dispatched.
    Started,
    /// Every item acknowledged and the job reaped.
    Completed,
}

impl JobState {
    /// Derive the state from the job's timestamps.
    pub fn from_times(start_time: Option<i64>, complete_time: Option<i64>) -> Self {
        match (start_time, complete_time) {
            (_, Some(_)) => Self::Completed,
            (Some(_), None) => Self::Started,
            (None, None) => Self::Scheduled,
        }
    }

    /// Whether the job may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Scheduled)
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Started => "started",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
