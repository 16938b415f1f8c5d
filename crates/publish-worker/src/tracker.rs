//! Completion tracker: item acknowledgements in, job-complete events out.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use publish_core::config::TrackerConfig;
use publish_core::error::{AppError, ErrorKind};
use publish_core::messages::{CollectionCompleteMessage, ItemAck, encode};
use publish_core::result::AppResult;
use publish_core::traits::{InboundMessage, MessageConsumer, MessageProducer};
use publish_core::types::time::now_nanos;
use publish_database::{CompletedJob, ItemUpdate, JobStore};

use crate::heartbeat::Heartbeat;

/// Records item completions and completes jobs with nothing outstanding.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    store: Arc<dyn JobStore>,
    events: Arc<dyn MessageProducer>,
    config: TrackerConfig,
    heartbeat: Arc<Heartbeat>,
}

impl CompletionTracker {
    /// Create a tracker that emits job-complete events to `events`.
    pub fn new(
        store: Arc<dyn JobStore>,
        events: Arc<dyn MessageProducer>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
            heartbeat: Arc::new(Heartbeat::new("completion_reaper")),
        }
    }

    /// Report reaper ticks to `heartbeat`.
    pub fn with_heartbeat(mut self, heartbeat: Arc<Heartbeat>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Record one acknowledgement.
    pub async fn mark_item_complete(&self, ack: &ItemAck, now: i64) -> AppResult<ItemUpdate> {
        let update = self.store.complete_item(ack.job_id, ack.item, now).await?;
        match update {
            ItemUpdate::Recorded => debug!(
                job_id = %ack.job_id,
                item = %ack.item,
                collection_id = %ack.collection_id,
                "Item complete"
            ),
            ItemUpdate::Unchanged => info!(
                job_id = %ack.job_id,
                item = %ack.item,
                "Acknowledgement had no effect; item already complete or unknown"
            ),
        }
        Ok(update)
    }

    async fn handle_ack(&self, message: InboundMessage) -> AppResult<()> {
        match ItemAck::decode(message.data()) {
            Ok(ack) => {
                self.mark_item_complete(&ack, now_nanos()).await?;
            }
            Err(e) if !e.is_fatal() => {
                warn!(offset = message.offset(), error = %e, "Dropping malformed acknowledgement");
            }
            Err(e) => return Err(e),
        }
        message.commit().await
    }

    /// Consume acknowledgements with at most `max_in_flight_acks` updates
    /// running at once.
    ///
    /// A message is committed only after its update succeeded. The first
    /// fatal error stops the loop.
    pub async fn run_acks(
        &self,
        mut consumer: Box<dyn MessageConsumer>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        let max_in_flight = self.config.max_in_flight_acks;
        info!(topic = consumer.topic(), max_in_flight, "Acknowledgement consumer started");

        let semaphore = Arc::new(Semaphore::new(max_in_flight));
        let mut tasks: JoinSet<AppResult<()>> = JoinSet::new();

        loop {
            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    flatten(joined)?;
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit.map_err(|e| {
                    AppError::with_source(ErrorKind::Internal, "Acknowledgement pool closed", e)
                })?,
            };

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    flatten(joined)?;
                    continue;
                }
                next = consumer.next() => next,
            };
            let Some(message) = next else {
                info!("Acknowledgement topic closed");
                break;
            };
            let message = message?;

            let tracker = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                tracker.handle_ack(message).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            flatten(joined)?;
        }
        info!("Acknowledgement consumer stopped");
        Ok(())
    }

    /// Complete every started job with no outstanding items and emit one
    /// event per job this call completed.
    pub async fn reap_at(&self, now: i64) -> AppResult<Vec<CompletedJob>> {
        let candidates = self.store.find_completable().await?;
        let mut completed = Vec::with_capacity(candidates.len());

        for job_id in candidates {
            let Some(job) = self.store.complete_job(job_id, now).await? else {
                debug!(job_id = %job_id, "Job already completed by a concurrent reap");
                continue;
            };

            let event = CollectionCompleteMessage {
                schedule_id: job.job_id,
                collection_id: job.collection_id.clone(),
            };
            self.events.send(encode(&event)?).await?;

            info!(
                job_id = %job.job_id,
                collection_id = %job.collection_id,
                elapsed_ms = job.elapsed().as_millis() as u64,
                "Collection publish complete"
            );
            completed.push(job);
        }
        Ok(completed)
    }

    /// Reap on a fixed interval until shutdown or a fatal error.
    pub async fn run_reaper(&self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        info!(reap_interval_ms = self.config.reap_interval_ms, "Completion reaper started");

        let mut ticker = time::interval(self.config.reap_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.reap_at(now_nanos()).await?;
                    self.heartbeat.beat();
                }
            }
        }

        info!("Completion reaper stopped");
        Ok(())
    }
}

fn flatten(joined: Result<AppResult<()>, tokio::task::JoinError>) -> AppResult<()> {
    joined.map_err(|e| {
        AppError::with_source(ErrorKind::Internal, "Acknowledgement task panicked", e)
    })?
}
