//! Job entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use publish_core::messages::FileResource;
use publish_core::types::JobId;

use super::state::JobState;

/// One scheduling request for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Store-assigned job identifier.
    pub id: JobId,
    /// Collection identifier.
    pub collection_id: String,
    /// Collection path in the content store.
    pub collection_path: String,
    /// Requested publish time.
    pub schedule_time: i64,
    /// When the poller claimed the job.
    pub start_time: Option<i64>,
    /// When the tracker completed the job.
    pub complete_time: Option<i64>,
}

impl Job {
    /// Lifecycle state derived from the timestamps.
    pub fn state(&self) -> JobState {
        JobState::from_times(self.start_time, self.complete_time)
    }

    /// Whether the job is due at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.complete_time.is_none() && self.schedule_time <= now
    }
}

/// Everything needed to admit a job together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    /// Collection identifier.
    pub collection_id: String,
    /// Collection path in the content store.
    pub collection_path: String,
    /// Requested publish time.
    pub schedule_time: i64,
    /// Files to publish.
    pub files: Vec<FileResource>,
    /// URIs to retract.
    pub deletes: Vec<String>,
}

impl NewJob {
    /// Total number of work items.
    pub fn item_count(&self) -> usize {
        self.files.len() + self.deletes.len()
    }
}
