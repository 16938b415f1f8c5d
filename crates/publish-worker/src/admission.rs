//! Admission of schedule and cancel requests.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use publish_core::messages::{ScheduleAction, ScheduleRequest};
use publish_core::result::AppResult;
use publish_core::traits::MessageConsumer;
use publish_core::types::JobId;
use publish_database::{JobStore, ScheduledJob};
use publish_entity::NewJob;

/// What a request did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A job was written, or an identical live job already existed.
    Scheduled(ScheduledJob),
    /// The listed unstarted jobs were removed; empty when nothing matched.
    Cancelled(Vec<JobId>),
}

/// Validates inbound requests and writes them to the job store.
#[derive(Debug, Clone)]
pub struct AdmissionHandler {
    store: Arc<dyn JobStore>,
}

impl AdmissionHandler {
    /// Create a handler over a job store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Decode and apply one raw request.
    pub async fn handle(&self, payload: &[u8]) -> AppResult<Admission> {
        let request = ScheduleRequest::decode(payload)?;
        match request.action {
            ScheduleAction::Schedule => self.schedule(&request).await.map(Admission::Scheduled),
            ScheduleAction::Cancel => self.cancel(&request).await.map(Admission::Cancelled),
        }
    }

    /// Write the job and all its items in one transaction.
    pub async fn schedule(&self, request: &ScheduleRequest) -> AppResult<ScheduledJob> {
        let job = NewJob {
            collection_id: request.collection_id.clone(),
            collection_path: request.collection_path.clone(),
            schedule_time: request.schedule_time_nanos()?,
            files: request.files.clone(),
            deletes: request.uris_to_delete.clone(),
        };

        let scheduled = self.store.schedule(&job).await?;
        if scheduled.created {
            info!(
                job_id = %scheduled.job_id,
                collection_id = %job.collection_id,
                schedule_time = job.schedule_time,
                files = scheduled.file_ids.len(),
                deletes = scheduled.delete_ids.len(),
                "Scheduled collection"
            );
        } else {
            info!(
                job_id = %scheduled.job_id,
                collection_id = %job.collection_id,
                "Duplicate schedule request resolved to existing job"
            );
        }
        Ok(scheduled)
    }

    /// Remove the unstarted job for the request's collection and time.
    pub async fn cancel(&self, request: &ScheduleRequest) -> AppResult<Vec<JobId>> {
        let schedule_time = request.schedule_time_nanos()?;
        let removed = self
            .store
            .cancel(&request.collection_id, schedule_time)
            .await?;

        if removed.is_empty() {
            info!(
                collection_id = %request.collection_id,
                schedule_time,
                "Nothing to cancel; job already started or absent"
            );
        } else {
            info!(
                collection_id = %request.collection_id,
                jobs = ?removed,
                "Cancelled scheduled collection"
            );
        }
        Ok(removed)
    }

    /// Consume requests until shutdown, topic close, or a fatal error.
    ///
    /// Malformed requests are logged and committed so they are not
    /// redelivered. A message is only committed after the store accepted it.
    pub async fn run(
        &self,
        mut consumer: Box<dyn MessageConsumer>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        info!(topic = consumer.topic(), "Admission handler started");

        loop {
            let message = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = consumer.next() => match next {
                    Some(message) => message?,
                    None => {
                        info!("Schedule topic closed");
                        break;
                    }
                },
            };

            match self.handle(message.data()).await {
                Ok(admission) => debug!(offset = message.offset(), ?admission, "Request admitted"),
                Err(e) if !e.is_fatal() => {
                    warn!(offset = message.offset(), error = %e, "Dropping malformed schedule request");
                }
                Err(e) => return Err(e),
            }
            message.commit().await?;
        }

        info!("Admission handler stopped");
        Ok(())
    }
}
