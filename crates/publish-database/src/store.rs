//! The job store seam.
//!
//! Two operations are contended and must be single atomic mutations in
//! every implementation: [`JobStore::claim_due`] (no job is ever returned
//! to two claimants) and [`JobStore::complete_job`] (a job completes at
//! most once). Everything else is plain request/response.

use std::time::Duration;

use async_trait::async_trait;

use publish_core::result::AppResult;
use publish_core::types::time::{duration_nanos, elapsed};
use publish_core::types::{DeleteItemId, FileItemId, ItemRef, JobId};
use publish_entity::{DeleteItem, FileItem, Job, NewJob};

/// Parameters of one claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Claim time; also the new `start_time`.
    pub now: i64,
    /// Started jobs whose `start_time` and latest item completion are at or
    /// before this instant are re-claimed. `None` disables restart recovery.
    pub restart_before: Option<i64>,
    /// Maximum rows claimed by this attempt. `None` is unbounded.
    pub limit: Option<u32>,
}

impl ClaimRequest {
    /// Claim at `now` with no restart recovery and no cap.
    pub fn at(now: i64) -> Self {
        Self {
            now,
            restart_before: None,
            limit: None,
        }
    }

    /// Cap the number of claimed rows.
    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Enable restart recovery for jobs quiet for longer than `gap`.
    pub fn with_restart_gap(mut self, gap: Option<Duration>) -> Self {
        self.restart_before = gap.map(|gap| self.now.saturating_sub(duration_nanos(gap)));
        self
    }
}

/// Result of admitting a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    /// The job id (new, or the existing live job for a redelivered request).
    pub job_id: JobId,
    /// `false` when an identical live job already existed.
    pub created: bool,
    /// Ids of the inserted file items, in submission order.
    pub file_ids: Vec<FileItemId>,
    /// Ids of the inserted delete items, in submission order.
    pub delete_ids: Vec<DeleteItemId>,
}

/// A job that the reaper has just completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// The completed job.
    pub job_id: JobId,
    /// Collection identifier.
    pub collection_id: String,
    /// When the job was (last) claimed.
    pub start_time: i64,
    /// When it was completed.
    pub complete_time: i64,
}

impl CompletedJob {
    /// Time from claim to completion.
    pub fn elapsed(&self) -> Duration {
        elapsed(self.start_time, self.complete_time)
    }
}

/// Outcome of recording an item acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemUpdate {
    /// The item's `complete_time` was set by this call.
    Recorded,
    /// The item was already complete or does not belong to the job.
    Unchanged,
}

/// Items of a job not yet acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutstandingCounts {
    /// Outstanding file items.
    pub files: i64,
    /// Outstanding delete items.
    pub deletes: i64,
}

impl OutstandingCounts {
    /// Total outstanding items.
    pub fn total(&self) -> i64 {
        self.files + self.deletes
    }
}

/// Persistence operations of the scheduler and the completion tracker.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Store type name (e.g., "postgres", "memory").
    fn provider_type(&self) -> &str;

    /// Check whether the store is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Release connections. Calls made afterwards fail.
    async fn close(&self) {}

    /// Insert a job and all its items in one transaction.
    async fn schedule(&self, job: &NewJob) -> AppResult<ScheduledJob>;

    /// Delete the not-yet-started jobs for a collection and schedule time,
    /// with their items. Returns the removed job ids, empty when nothing
    /// matched.
    async fn cancel(&self, collection_id: &str, schedule_time: i64) -> AppResult<Vec<JobId>>;

    /// Atomically mark due jobs as started and return them, ordered by
    /// schedule time then id.
    async fn claim_due(&self, request: ClaimRequest) -> AppResult<Vec<Job>>;

    /// File items of a job that are not yet complete.
    async fn outstanding_files(&self, job_id: JobId) -> AppResult<Vec<FileItem>>;

    /// Delete items of a job that are not yet complete.
    async fn outstanding_deletes(&self, job_id: JobId) -> AppResult<Vec<DeleteItem>>;

    /// Set an item's `complete_time` if it is not set yet.
    async fn complete_item(&self, job_id: JobId, item: ItemRef, now: i64)
    -> AppResult<ItemUpdate>;

    /// Started, incomplete jobs with zero outstanding items.
    async fn find_completable(&self) -> AppResult<Vec<JobId>>;

    /// Complete a started job unless it is already complete.
    async fn complete_job(&self, job_id: JobId, now: i64) -> AppResult<Option<CompletedJob>>;

    /// Find a job by id.
    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>>;

    /// Outstanding item counts for a job.
    async fn outstanding_counts(&self, job_id: JobId) -> AppResult<OutstandingCounts>;
}
