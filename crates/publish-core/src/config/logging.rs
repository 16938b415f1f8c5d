//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Log output settings for the `publish-scheduler` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"publish_worker=debug,info"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// `"json"` for one object per line, anything else for human-readable output.
    #[serde(default = "default_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Whether to emit JSON lines.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "json".to_string()
}
