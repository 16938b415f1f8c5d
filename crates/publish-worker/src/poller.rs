//! Claim poller: moves due jobs from SCHEDULED to STARTED on a fixed tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use publish_core::config::SchedulerConfig;
use publish_core::error::AppError;
use publish_core::result::AppResult;
use publish_core::traits::SecretResolver;
use publish_core::types::time::now_nanos;
use publish_database::{ClaimRequest, JobStore};
use publish_entity::Job;

use crate::dispatcher::DispatchJob;
use crate::heartbeat::Heartbeat;

/// Periodically claims due jobs and queues them for dispatch.
#[derive(Debug)]
pub struct ClaimPoller {
    store: Arc<dyn JobStore>,
    secrets: Arc<dyn SecretResolver>,
    config: SchedulerConfig,
    queue: mpsc::Sender<DispatchJob>,
    key_attempts: u32,
    key_backoff: Duration,
    heartbeat: Arc<Heartbeat>,
}

impl ClaimPoller {
    /// Create a poller that feeds `queue`.
    pub fn new(
        store: Arc<dyn JobStore>,
        secrets: Arc<dyn SecretResolver>,
        config: SchedulerConfig,
        queue: mpsc::Sender<DispatchJob>,
    ) -> Self {
        Self {
            store,
            secrets,
            config,
            queue,
            key_attempts: 1,
            key_backoff: Duration::ZERO,
            heartbeat: Arc::new(Heartbeat::new("claim_poller")),
        }
    }

    /// Retry key lookups `attempts` times, waiting `backoff * n` before
    /// retry `n`.
    pub fn with_key_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.key_attempts = attempts.max(1);
        self.key_backoff = backoff;
        self
    }

    /// Report ticks to `heartbeat`.
    pub fn with_heartbeat(mut self, heartbeat: Arc<Heartbeat>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Run one claim tick at `now`. Returns how many jobs were queued.
    pub async fn tick_at(&self, now: i64) -> AppResult<usize> {
        let request = ClaimRequest::at(now)
            .with_limit(self.config.launch_limit())
            .with_restart_gap(self.config.restart_gap());

        let claimed = self.store.claim_due(request).await?;
        if claimed.is_empty() {
            return Ok(0);
        }
        info!(claimed = claimed.len(), "Claimed due jobs");

        let count = claimed.len();
        for (queued, job) in claimed.into_iter().enumerate() {
            let dispatch = self.prepare(job).await?;
            if self.queue.send(dispatch).await.is_err() {
                return Err(AppError::internal(format!(
                    "Dispatch queue closed with {} claimed jobs unqueued",
                    count - queued
                )));
            }
        }
        Ok(count)
    }

    async fn prepare(&self, job: Job) -> AppResult<DispatchJob> {
        let files = self.store.outstanding_files(job.id).await?;
        let deletes = self.store.outstanding_deletes(job.id).await?;
        let encryption_key = self.resolve_key(&job.collection_id).await?;

        debug!(
            job_id = %job.id,
            collection_id = %job.collection_id,
            files = files.len(),
            deletes = deletes.len(),
            "Prepared job for dispatch"
        );
        Ok(DispatchJob {
            job,
            encryption_key,
            files,
            deletes,
        })
    }

    async fn resolve_key(&self, collection_id: &str) -> AppResult<String> {
        let mut attempt = 1;
        loop {
            match self.secrets.resolve_key(collection_id).await {
                Ok(key) => return Ok(key),
                Err(e) if attempt < self.key_attempts => {
                    let wait = self.key_backoff.saturating_mul(attempt);
                    warn!(
                        collection_id,
                        attempt,
                        max_attempts = self.key_attempts,
                        error = %e,
                        "Key lookup failed, retrying in {wait:?}"
                    );
                    time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Tick until shutdown, a fatal error, or the dispatch queue closing.
    ///
    /// A tick in progress when shutdown arrives runs to the end so its
    /// claimed jobs reach the queue. A closed queue means the dispatcher
    /// has stopped and is a clean stop here.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_launch_per_tick = self.config.max_launch_per_tick,
            restart_gap_seconds = self.config.restart_gap_seconds,
            "Claim poller started"
        );

        let mut ticker = time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.tick_at(now_nanos()).await {
                        Ok(_) => self.heartbeat.beat(),
                        Err(e) if self.queue.is_closed() => {
                            warn!(error = %e, "Dispatch queue closed, stopping claim poller");
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        info!("Claim poller stopped");
        Ok(())
    }
}
