//! Cron-driven maintenance: secrets service token renewal.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info};

use publish_core::error::AppError;
use publish_core::result::AppResult;
use publish_core::traits::SecretResolver;

/// Cron scheduler for periodic maintenance tasks.
///
/// Tasks cannot return errors to the scheduler, so fatal failures are
/// reported on the channel passed at registration.
pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler").finish()
    }
}

impl MaintenanceScheduler {
    /// Create a new scheduler.
    pub async fn new() -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;
        Ok(Self { scheduler })
    }

    /// Renew the resolver's token every `interval_minutes` minutes.
    ///
    /// Returns `false` without registering anything when the interval is 0.
    /// A failed renewal is sent to `failures`.
    pub async fn register_token_renewal(
        &self,
        resolver: Arc<dyn SecretResolver>,
        interval_minutes: u32,
        failures: mpsc::Sender<AppError>,
    ) -> AppResult<bool> {
        if interval_minutes == 0 {
            info!("Token renewal disabled");
            return Ok(false);
        }
        if interval_minutes > 59 {
            return Err(AppError::configuration(format!(
                "Token renewal interval {interval_minutes} must be at most 59 minutes"
            )));
        }

        let schedule = renewal_schedule(interval_minutes);
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let resolver = Arc::clone(&resolver);
            let failures = failures.clone();
            Box::pin(async move {
                renew_token(resolver.as_ref(), &failures).await;
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create token_renewal schedule: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add token_renewal schedule: {e}")))?;

        info!("Registered: token_renewal (every {interval_minutes}min)");
        Ok(true)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        info!("Maintenance scheduler started");
        Ok(())
    }

    /// Shut the scheduler down.
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;
        info!("Maintenance scheduler shut down");
        Ok(())
    }
}

/// Six-field cron expression firing every `minutes` minutes.
fn renewal_schedule(minutes: u32) -> String {
    format!("0 */{minutes} * * * *")
}

async fn renew_token(resolver: &dyn SecretResolver, failures: &mpsc::Sender<AppError>) {
    match resolver.renew().await {
        Ok(()) => debug!(provider = resolver.provider_type(), "Token renewal succeeded"),
        Err(e) => {
            error!(error = %e, "Failed to renew secrets service token");
            if failures.try_send(e).is_err() {
                debug!("Renewal failure already reported");
            }
        }
    }
}
