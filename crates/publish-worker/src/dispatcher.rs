//! Dispatcher: one outbound message per work item.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use publish_core::error::{AppError, ErrorKind};
use publish_core::messages::{PublishDeleteMessage, PublishFileMessage, encode};
use publish_core::result::AppResult;
use publish_core::traits::MessageProducer;
use publish_entity::{DeleteItem, FileItem, Job};

/// A claimed job with everything needed to publish it.
#[derive(Clone)]
pub struct DispatchJob {
    /// The claimed job row.
    pub job: Job,
    /// The collection's decryption key.
    pub encryption_key: String,
    /// Outstanding file items.
    pub files: Vec<FileItem>,
    /// Outstanding delete items.
    pub deletes: Vec<DeleteItem>,
}

impl std::fmt::Debug for DispatchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchJob")
            .field("job", &self.job)
            .field("encryption_key", &"****")
            .field("files", &self.files.len())
            .field("deletes", &self.deletes.len())
            .finish()
    }
}

/// Hands per-item messages to the bus. Does not wait for completions.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    files: Arc<dyn MessageProducer>,
    deletes: Arc<dyn MessageProducer>,
}

impl Dispatcher {
    /// Create a dispatcher over the file and delete topics.
    pub fn new(files: Arc<dyn MessageProducer>, deletes: Arc<dyn MessageProducer>) -> Self {
        Self { files, deletes }
    }

    /// Send one message per file item and one per delete item.
    ///
    /// Returns the number of messages sent.
    pub async fn publish(&self, dispatch: &DispatchJob) -> AppResult<usize> {
        let job = &dispatch.job;

        for file in &dispatch.files {
            let message = PublishFileMessage {
                schedule_id: job.id,
                file_id: file.id,
                collection_id: job.collection_id.clone(),
                collection_path: job.collection_path.clone(),
                encryption_key: dispatch.encryption_key.clone(),
                file_location: file.file_location.clone(),
                uri: file.uri.clone(),
            };
            self.files.send(encode(&message)?).await?;
            debug!(job_id = %job.id, file_id = %file.id, uri = %file.uri, "Sent publish-file");
        }

        for delete in &dispatch.deletes {
            let message = PublishDeleteMessage {
                schedule_id: job.id,
                delete_id: delete.id,
                uri: delete.uri.clone(),
                collection_id: job.collection_id.clone(),
            };
            self.deletes.send(encode(&message)?).await?;
            debug!(job_id = %job.id, delete_id = %delete.id, uri = %delete.uri, "Sent publish-delete");
        }

        let sent = dispatch.files.len() + dispatch.deletes.len();
        info!(
            job_id = %job.id,
            collection_id = %job.collection_id,
            files = dispatch.files.len(),
            deletes = dispatch.deletes.len(),
            "Dispatched collection"
        );
        Ok(sent)
    }

    /// Publish queued jobs with at most `max_concurrent` in flight.
    ///
    /// Stops when the queue closes. On shutdown the queue is closed to new
    /// jobs and everything already buffered is still dispatched, since those
    /// jobs are claimed. In-flight jobs are awaited before returning. A
    /// failed send is fatal.
    pub async fn run(
        &self,
        mut queue: mpsc::Receiver<DispatchJob>,
        max_concurrent: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<()> {
        info!(max_concurrent, "Dispatch pool started");
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut tasks: JoinSet<AppResult<usize>> = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        queue.close();
                        break;
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    flatten(joined)?;
                }
                next = queue.recv() => {
                    let Some(dispatch) = next else {
                        debug!("Dispatch queue closed");
                        break;
                    };
                    self.spawn_dispatch(&semaphore, &mut tasks, dispatch).await?;
                }
            }
        }

        let mut buffered = 0usize;
        while let Some(dispatch) = queue.recv().await {
            buffered += 1;
            self.spawn_dispatch(&semaphore, &mut tasks, dispatch).await?;
        }
        info!(buffered, in_flight = tasks.len(), "Dispatch pool draining");
        while let Some(joined) = tasks.join_next().await {
            flatten(joined)?;
        }
        info!("Dispatch pool stopped");
        Ok(())
    }

    async fn spawn_dispatch(
        &self,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<AppResult<usize>>,
        dispatch: DispatchJob,
    ) -> AppResult<()> {
        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Dispatch pool closed", e))?;
        let dispatcher = self.clone();
        tasks.spawn(async move {
            let _permit = permit;
            dispatcher.publish(&dispatch).await
        });
        Ok(())
    }
}

fn flatten(joined: Result<AppResult<usize>, tokio::task::JoinError>) -> AppResult<usize> {
    match joined {
        Ok(result) => result.inspect_err(|e| error!(error = %e, "Dispatch failed")),
        Err(e) => Err(AppError::with_source(ErrorKind::Internal, "Dispatch task panicked", e)),
    }
}
