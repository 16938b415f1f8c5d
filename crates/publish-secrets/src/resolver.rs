//! Collection key resolvers.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use publish_core::config::SecretsConfig;
use publish_core::result::AppResult;
use publish_core::traits::SecretResolver;

use crate::vault::VaultClient;

/// Reads `{path_prefix}/{collection_id}` and returns its key field.
#[derive(Debug, Clone)]
pub struct VaultSecretResolver {
    client: VaultClient,
    path_prefix: String,
    key_field: String,
}

impl VaultSecretResolver {
    /// Create a resolver over an existing client.
    pub fn new(client: VaultClient, config: &SecretsConfig) -> Self {
        Self {
            client,
            path_prefix: config.path_prefix.trim_end_matches('/').to_string(),
            key_field: config.key_field.clone(),
        }
    }

    fn secret_path(&self, collection_id: &str) -> String {
        format!("{}/{}", self.path_prefix, collection_id)
    }
}

#[async_trait]
impl SecretResolver for VaultSecretResolver {
    fn provider_type(&self) -> &str {
        "vault"
    }

    async fn resolve_key(&self, collection_id: &str) -> AppResult<String> {
        let secret = self.client.read(&self.secret_path(collection_id)).await?;
        let key = match secret.get(&self.key_field) {
            Some(Value::String(key)) => key.clone(),
            _ => {
                debug!(collection_id, field = %self.key_field, "Collection has no key");
                String::new()
            }
        };
        Ok(key)
    }

    async fn renew(&self) -> AppResult<()> {
        self.client.renew_self().await?;
        info!(address = self.client.address(), "Secrets service token renewed");
        Ok(())
    }
}

/// Serves keys from configuration. Unknown collections get an empty key.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretResolver {
    keys: HashMap<String, String>,
}

impl StaticSecretResolver {
    /// Create a resolver over a fixed key map.
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    fn provider_type(&self) -> &str {
        "static"
    }

    async fn resolve_key(&self, collection_id: &str) -> AppResult<String> {
        Ok(self.keys.get(collection_id).cloned().unwrap_or_default())
    }
}
