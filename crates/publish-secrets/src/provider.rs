//! Resolver selection by configuration.

use std::sync::Arc;

use tracing::info;

use publish_core::config::SecretsConfig;
use publish_core::error::AppError;
use publish_core::result::AppResult;
use publish_core::traits::SecretResolver;

use crate::resolver::{StaticSecretResolver, VaultSecretResolver};
use crate::vault::VaultClient;

/// Build the configured secret resolver.
pub fn build_resolver(config: &SecretsConfig) -> AppResult<Arc<dyn SecretResolver>> {
    match config.provider.as_str() {
        "vault" => {
            info!(address = %config.address, "Using Vault secret resolver");
            let client = VaultClient::new(config)?;
            Ok(Arc::new(VaultSecretResolver::new(client, config)))
        }
        "static" => {
            info!(keys = config.static_keys.len(), "Using static secret resolver");
            Ok(Arc::new(StaticSecretResolver::new(config.static_keys.clone())))
        }
        other => Err(AppError::configuration(format!(
            "Unknown secrets provider: '{other}'. Supported: vault, static"
        ))),
    }
}
