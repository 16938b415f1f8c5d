//! Job store selection by configuration.

use std::sync::Arc;

use tracing::info;

use publish_core::config::DatabaseConfig;
use publish_core::error::AppError;
use publish_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::MemoryJobStore;
use crate::migration::run_migrations;
use crate::repositories::JobRepository;
use crate::store::JobStore;

/// Build the configured job store.
pub async fn connect_store(config: &DatabaseConfig) -> AppResult<Arc<dyn JobStore>> {
    match config.provider.as_str() {
        "postgres" => {
            let db = DatabasePool::connect(config).await?;
            if config.run_migrations {
                run_migrations(db.pool()).await?;
            }
            info!("Using PostgreSQL job store");
            Ok(Arc::new(JobRepository::new(db)))
        }
        "memory" => {
            info!("Using in-memory job store");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        other => Err(AppError::configuration(format!(
            "Unknown database provider: '{other}'. Supported: postgres, memory"
        ))),
    }
}
