//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files and `PIPELINE__`-prefixed environment variables. Each
//! sub-module represents a logical configuration section, and every section
//! has defaults so an empty configuration is valid.

pub mod app;
pub mod bus;
pub mod database;
pub mod logging;
pub mod scheduler;
pub mod secrets;
pub mod tracker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::bus::{BusConfig, TopicConfig};
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::scheduler::SchedulerConfig;
pub use self::secrets::SecretsConfig;
pub use self::tracker::TrackerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Claim poller and dispatch settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Completion tracker settings.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Secrets service settings.
    #[serde(default)]
    pub secrets: SecretsConfig,
    /// Message bus settings.
    #[serde(default)]
    pub bus: BusConfig,
    /// Health/status HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with an environment-specific overlay and
    /// environment variables prefixed with `PIPELINE__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PIPELINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the loops cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if !matches!(self.database.provider.as_str(), "postgres" | "memory") {
            return Err(AppError::configuration(format!(
                "Unknown database provider: '{}'. Supported: postgres, memory",
                self.database.provider
            )));
        }
        if !matches!(self.secrets.provider.as_str(), "vault" | "static") {
            return Err(AppError::configuration(format!(
                "Unknown secrets provider: '{}'. Supported: vault, static",
                self.secrets.provider
            )));
        }
        if self.bus.provider != "memory" {
            return Err(AppError::configuration(format!(
                "Unknown bus provider: '{}'. Supported: memory",
                self.bus.provider
            )));
        }
        if self.scheduler.poll_interval_ms == 0 || self.tracker.reap_interval_ms == 0 {
            return Err(AppError::configuration(
                "poll_interval_ms and reap_interval_ms must be non-zero",
            ));
        }
        if self.scheduler.max_concurrent_dispatches == 0
            || self.scheduler.dispatch_queue_capacity == 0
        {
            return Err(AppError::configuration(
                "max_concurrent_dispatches and dispatch_queue_capacity must be non-zero",
            ));
        }
        if self.tracker.max_in_flight_acks == 0 {
            return Err(AppError::configuration("max_in_flight_acks must be non-zero"));
        }
        if self.secrets.renew_interval_minutes > 59 {
            return Err(AppError::configuration(
                "renew_interval_minutes must be between 0 and 59",
            ));
        }
        if self.secrets.max_attempts == 0 {
            return Err(AppError::configuration("secrets.max_attempts must be at least 1"));
        }
        if self.bus.capacity == 0 {
            return Err(AppError::configuration("bus.capacity must be non-zero"));
        }
        Ok(())
    }
}
