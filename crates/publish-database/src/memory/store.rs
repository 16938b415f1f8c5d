//! Mutex-guarded job store.
//!
//! Every trait operation takes the lock once, so claim and reap are as
//! atomic here as their single-statement PostgreSQL counterparts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use publish_core::error::AppError;
use publish_core::result::AppResult;
use publish_core::types::{DeleteItemId, FileItemId, ItemRef, JobId};
use publish_entity::{DeleteItem, FileItem, Job, NewJob};

use crate::store::{
    ClaimRequest, CompletedJob, ItemUpdate, JobStore, OutstandingCounts, ScheduledJob,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_job_id: i64,
    next_file_id: i64,
    next_delete_id: i64,
    jobs: BTreeMap<JobId, Job>,
    files: BTreeMap<FileItemId, FileItem>,
    deletes: BTreeMap<DeleteItemId, DeleteItem>,
}

impl MemoryState {
    fn files_of(&self, job_id: JobId) -> impl Iterator<Item = &FileItem> {
        self.files.values().filter(move |f| f.job_id == job_id)
    }

    fn deletes_of(&self, job_id: JobId) -> impl Iterator<Item = &DeleteItem> {
        self.deletes.values().filter(move |d| d.job_id == job_id)
    }

    fn latest_item_completion(&self, job_id: JobId) -> Option<i64> {
        self.files_of(job_id)
            .filter_map(|f| f.complete_time)
            .chain(self.deletes_of(job_id).filter_map(|d| d.complete_time))
            .max()
    }

    fn is_claimable(&self, job: &Job, request: &ClaimRequest) -> bool {
        if job.complete_time.is_some() || job.schedule_time > request.now {
            return false;
        }
        match (job.start_time, request.restart_before) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(started), Some(before)) => {
                started <= before
                    && self
                        .latest_item_completion(job.id)
                        .is_none_or(|latest| latest <= before)
            }
        }
    }

    fn outstanding(&self, job_id: JobId) -> OutstandingCounts {
        OutstandingCounts {
            files: self
                .files_of(job_id)
                .filter(|f| f.complete_time.is_none())
                .count() as i64,
            deletes: self
                .deletes_of(job_id)
                .filter(|d| d.complete_time.is_none())
                .count() as i64,
        }
    }
}

/// Job store kept in process memory.
///
/// Used by the `memory` database provider and by tests. Store outages can be
/// simulated with [`MemoryJobStore::set_available`].
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a database error while
    /// `available` is false.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of stored jobs, in any state.
    pub fn job_count(&self) -> usize {
        self.state.lock().map(|s| s.jobs.len()).unwrap_or(0)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Job store unavailable"));
        }
        self.state
            .lock()
            .map_err(|_| AppError::database("Job store lock poisoned"))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.lock().map(|_| true)
    }

    async fn close(&self) {
        self.set_available(false);
    }

    async fn schedule(&self, job: &NewJob) -> AppResult<ScheduledJob> {
        let mut state = self.lock()?;

        let existing = state.jobs.values().find(|j| {
            j.complete_time.is_none()
                && j.collection_id == job.collection_id
                && j.schedule_time == job.schedule_time
        });
        if let Some(existing) = existing {
            debug!(job_id = %existing.id, collection_id = %job.collection_id, "Job already admitted");
            return Ok(ScheduledJob {
                job_id: existing.id,
                created: false,
                file_ids: Vec::new(),
                delete_ids: Vec::new(),
            });
        }

        state.next_job_id += 1;
        let job_id = JobId::new(state.next_job_id);
        state.jobs.insert(
            job_id,
            Job {
                id: job_id,
                collection_id: job.collection_id.clone(),
                collection_path: job.collection_path.clone(),
                schedule_time: job.schedule_time,
                start_time: None,
                complete_time: None,
            },
        );

        let mut file_ids = Vec::with_capacity(job.files.len());
        for file in &job.files {
            state.next_file_id += 1;
            let id = FileItemId::new(state.next_file_id);
            state.files.insert(
                id,
                FileItem {
                    id,
                    job_id,
                    uri: file.uri.clone(),
                    file_location: file.location.clone(),
                    complete_time: None,
                },
            );
            file_ids.push(id);
        }

        let mut delete_ids = Vec::with_capacity(job.deletes.len());
        for uri in &job.deletes {
            state.next_delete_id += 1;
            let id = DeleteItemId::new(state.next_delete_id);
            state.deletes.insert(
                id,
                DeleteItem {
                    id,
                    job_id,
                    uri: uri.clone(),
                    complete_time: None,
                },
            );
            delete_ids.push(id);
        }

        Ok(ScheduledJob {
            job_id,
            created: true,
            file_ids,
            delete_ids,
        })
    }

    async fn cancel(&self, collection_id: &str, schedule_time: i64) -> AppResult<Vec<JobId>> {
        let mut state = self.lock()?;

        let removed: Vec<JobId> = state
            .jobs
            .values()
            .filter(|j| {
                j.start_time.is_none()
                    && j.collection_id == collection_id
                    && j.schedule_time == schedule_time
            })
            .map(|j| j.id)
            .collect();

        for id in &removed {
            state.jobs.remove(id);
        }
        state.files.retain(|_, f| !removed.contains(&f.job_id));
        state.deletes.retain(|_, d| !removed.contains(&d.job_id));
        Ok(removed)
    }

    async fn claim_due(&self, request: ClaimRequest) -> AppResult<Vec<Job>> {
        let mut state = self.lock()?;

        let mut candidates: Vec<(i64, JobId)> = state
            .jobs
            .values()
            .filter(|j| state.is_claimable(j, &request))
            .map(|j| (j.schedule_time, j.id))
            .collect();
        candidates.sort_unstable();
        if let Some(limit) = request.limit {
            candidates.truncate(limit as usize);
        }

        let mut claimed = Vec::with_capacity(candidates.len());
        for (_, id) in candidates {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.start_time = Some(request.now);
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn outstanding_files(&self, job_id: JobId) -> AppResult<Vec<FileItem>> {
        let state = self.lock()?;
        Ok(state
            .files_of(job_id)
            .filter(|f| f.complete_time.is_none())
            .cloned()
            .collect())
    }

    async fn outstanding_deletes(&self, job_id: JobId) -> AppResult<Vec<DeleteItem>> {
        let state = self.lock()?;
        Ok(state
            .deletes_of(job_id)
            .filter(|d| d.complete_time.is_none())
            .cloned()
            .collect())
    }

    async fn complete_item(
        &self,
        job_id: JobId,
        item: ItemRef,
        now: i64,
    ) -> AppResult<ItemUpdate> {
        let mut state = self.lock()?;

        let slot = match item {
            ItemRef::File(id) => state
                .files
                .get_mut(&id)
                .filter(|f| f.job_id == job_id)
                .map(|f| &mut f.complete_time),
            ItemRef::Delete(id) => state
                .deletes
                .get_mut(&id)
                .filter(|d| d.job_id == job_id)
                .map(|d| &mut d.complete_time),
        };

        Ok(match slot {
            Some(complete_time) if complete_time.is_none() => {
                *complete_time = Some(now);
                ItemUpdate::Recorded
            }
            _ => ItemUpdate::Unchanged,
        })
    }

    async fn find_completable(&self) -> AppResult<Vec<JobId>> {
        let state = self.lock()?;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.start_time.is_some() && j.complete_time.is_none())
            .filter(|j| state.outstanding(j.id).total() == 0)
            .map(|j| j.id)
            .collect())
    }

    async fn complete_job(&self, job_id: JobId, now: i64) -> AppResult<Option<CompletedJob>> {
        let mut state = self.lock()?;

        let Some(job) = state.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        let Some(start_time) = job.start_time else {
            return Ok(None);
        };
        if job.complete_time.is_some() {
            return Ok(None);
        }

        job.complete_time = Some(now);
        Ok(Some(CompletedJob {
            job_id,
            collection_id: job.collection_id.clone(),
            start_time,
            complete_time: now,
        }))
    }

    async fn find_job(&self, job_id: JobId) -> AppResult<Option<Job>> {
        let state = self.lock()?;
        Ok(state.jobs.get(&job_id).cloned())
    }

    async fn outstanding_counts(&self, job_id: JobId) -> AppResult<OutstandingCounts> {
        let state = self.lock()?;
        Ok(state.outstanding(job_id))
    }
}
