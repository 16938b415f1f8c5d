//! Secrets service configuration.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where collection decryption keys come from.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Resolver type: `"vault"` or `"static"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Secrets service base address.
    #[serde(default = "default_address")]
    pub address: String,
    /// Access token.
    #[serde(default)]
    pub token: String,
    /// Minutes between token renewals (0 = never renew).
    #[serde(default = "default_renew_interval")]
    pub renew_interval_minutes: u32,
    /// Path prefix under which each collection's secret is stored.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    /// Field of the secret holding the key.
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Lookup attempts per job before the failure becomes fatal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff step in milliseconds between lookup attempts.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Keys served by the `static` provider, by collection id.
    #[serde(default)]
    pub static_keys: HashMap<String, String>,
}

impl SecretsConfig {
    /// Request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("provider", &self.provider)
            .field("address", &self.address)
            .field("token", &"****")
            .field("renew_interval_minutes", &self.renew_interval_minutes)
            .field("path_prefix", &self.path_prefix)
            .field("key_field", &self.key_field)
            .field("max_attempts", &self.max_attempts)
            .field("static_keys", &self.static_keys.len())
            .finish()
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            address: default_address(),
            token: String::new(),
            renew_interval_minutes: default_renew_interval(),
            path_prefix: default_path_prefix(),
            key_field: default_key_field(),
            request_timeout_seconds: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            static_keys: HashMap::new(),
        }
    }
}

fn default_provider() -> String {
    "vault".to_string()
}

fn default_address() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_renew_interval() -> u32 {
    5
}

fn default_path_prefix() -> String {
    "secret/collections".to_string()
}

fn default_key_field() -> String {
    "encryption_key".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    250
}
