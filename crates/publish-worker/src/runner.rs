//! Pipeline runner: spawns every loop and stops them together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use publish_core::config::{AppConfig, TopicConfig};
use publish_core::error::{AppError, ErrorKind};
use publish_core::result::AppResult;
use publish_core::traits::{MessageConsumer, MessageProducer, SecretResolver};
use publish_database::JobStore;

use crate::admission::AdmissionHandler;
use crate::bus::MemoryBus;
use crate::dispatcher::Dispatcher;
use crate::heartbeat::Liveness;
use crate::maintenance::MaintenanceScheduler;
use crate::poller::ClaimPoller;
use crate::tracker::CompletionTracker;

/// The topics the core reads and writes.
#[derive(Debug)]
pub struct PipelineBus {
    /// Inbound schedule/cancel requests.
    pub schedule: Box<dyn MessageConsumer>,
    /// Inbound item acknowledgements.
    pub item_complete: Box<dyn MessageConsumer>,
    /// Outbound publish-file messages.
    pub publish_file: Arc<dyn MessageProducer>,
    /// Outbound publish-delete messages.
    pub publish_delete: Arc<dyn MessageProducer>,
    /// Outbound job-complete events.
    pub collection_complete: Arc<dyn MessageProducer>,
}

impl PipelineBus {
    /// Bind to the configured topics of an in-memory bus.
    pub fn from_memory(bus: &MemoryBus, topics: &TopicConfig) -> AppResult<Self> {
        Ok(Self {
            schedule: Box::new(bus.take_consumer(&topics.schedule)?),
            item_complete: Box::new(bus.take_consumer(&topics.item_complete)?),
            publish_file: Arc::new(bus.producer(&topics.publish_file)?),
            publish_delete: Arc::new(bus.producer(&topics.publish_delete)?),
            collection_complete: Arc::new(bus.producer(&topics.collection_complete)?),
        })
    }
}

type LoopResult = (&'static str, AppResult<()>);

/// Owns the pipeline's loops for one process.
#[derive(Debug)]
pub struct PipelineRunner {
    config: AppConfig,
    store: Arc<dyn JobStore>,
    secrets: Arc<dyn SecretResolver>,
    bus: PipelineBus,
    liveness: Liveness,
}

impl PipelineRunner {
    /// Create a runner.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn JobStore>,
        secrets: Arc<dyn SecretResolver>,
        bus: PipelineBus,
        liveness: Liveness,
    ) -> Self {
        Self {
            config,
            store,
            secrets,
            bus,
            liveness,
        }
    }

    /// Run every loop until `shutdown` is signalled or a loop stops.
    ///
    /// Returns the first fatal error, after all loops have stopped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let Self {
            config,
            store,
            secrets,
            bus,
            liveness,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (queue_tx, queue_rx) = mpsc::channel(config.scheduler.dispatch_queue_capacity);
        let (failure_tx, mut failure_rx) = mpsc::channel(1);
        let mut loops: JoinSet<LoopResult> = JoinSet::new();

        let admission = AdmissionHandler::new(Arc::clone(&store));
        let rx = stop_rx.clone();
        loops.spawn(async move { ("admission", admission.run(bus.schedule, rx).await) });

        let poller = ClaimPoller::new(
            Arc::clone(&store),
            Arc::clone(&secrets),
            config.scheduler.clone(),
            queue_tx,
        )
        .with_key_retry(
            config.secrets.max_attempts,
            Duration::from_millis(config.secrets.retry_backoff_ms),
        )
        .with_heartbeat(Arc::clone(&liveness.poller));
        // The dispatcher drains once the poller has stopped and released the
        // queue sender.
        let (poller_done_tx, poller_done_rx) = watch::channel(false);
        let rx = stop_rx.clone();
        loops.spawn(async move {
            let result = poller.run(rx).await;
            drop(poller);
            let _ = poller_done_tx.send(true);
            ("claim_poller", result)
        });

        let dispatcher = Dispatcher::new(bus.publish_file, bus.publish_delete);
        let max_dispatches = config.scheduler.max_concurrent_dispatches;
        loops.spawn(async move {
            ("dispatcher", dispatcher.run(queue_rx, max_dispatches, poller_done_rx).await)
        });

        let tracker = CompletionTracker::new(
            Arc::clone(&store),
            bus.collection_complete,
            config.tracker.clone(),
        )
        .with_heartbeat(Arc::clone(&liveness.reaper));
        let acks = tracker.clone();
        let rx = stop_rx.clone();
        let consumer = bus.item_complete;
        loops.spawn(async move { ("ack_consumer", acks.run_acks(consumer, rx).await) });
        let rx = stop_rx.clone();
        loops.spawn(async move { ("reaper", tracker.run_reaper(rx).await) });

        let maintenance = MaintenanceScheduler::new().await?;
        maintenance
            .register_token_renewal(
                Arc::clone(&secrets),
                config.secrets.renew_interval_minutes,
                failure_tx,
            )
            .await?;
        maintenance.start().await?;

        info!(store = store.provider_type(), secrets = secrets.provider_type(), "Pipeline running");

        let mut first_error: Option<AppError> = None;
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() {
                    info!("Shutdown requested");
                } else {
                    warn!("Shutdown handle dropped, stopping pipeline");
                }
            }
            Some(e) = failure_rx.recv() => {
                error!(error = %e, "Maintenance task failed");
                first_error = Some(e);
            }
            Some(joined) = loops.join_next() => {
                record(joined, &mut first_error);
            }
        }

        let _ = stop_tx.send(true);
        while let Some(joined) = loops.join_next().await {
            record(joined, &mut first_error);
        }
        if let Err(e) = maintenance.shutdown().await {
            warn!(error = %e, "Maintenance scheduler did not shut down cleanly");
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Pipeline stopped");
                Ok(())
            }
        }
    }
}

fn record(
    joined: Result<LoopResult, tokio::task::JoinError>,
    first_error: &mut Option<AppError>,
) {
    let error = match joined {
        Ok((name, Ok(()))) => {
            info!(loop_name = name, "Loop stopped");
            return;
        }
        Ok((name, Err(e))) => {
            error!(loop_name = name, error = %e, "Loop failed");
            e
        }
        Err(e) => {
            error!(error = %e, "Loop panicked");
            AppError::with_source(ErrorKind::Internal, "Pipeline loop panicked", e)
        }
    };
    if first_error.is_none() {
        *first_error = Some(error);
    }
}
