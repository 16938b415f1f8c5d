//! Minimal Vault client: logical reads and token self-renewal.

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use publish_core::config::SecretsConfig;
use publish_core::error::{AppError, ErrorKind};
use publish_core::result::AppResult;

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Debug, Deserialize)]
struct SecretResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

/// Client for one secrets service address and token.
#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    address: String,
    token: String,
}

impl VaultClient {
    /// Build a client from configuration.
    pub fn new(config: &SecretsConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build secrets service HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            http,
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Service base address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Read the secret stored at `path`.
    ///
    /// A path with no secret yields an empty map rather than an error.
    pub async fn read(&self, path: &str) -> AppResult<Map<String, Value>> {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::SecretResolution,
                    format!("Secrets service request for '{path}' failed"),
                    e,
                )
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            debug!(path, "No secret stored");
            return Ok(Map::new());
        }
        if !status.is_success() {
            return Err(AppError::secret(format!(
                "Secrets service returned {status} for '{path}'"
            )));
        }

        let body: SecretResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::SecretResolution,
                format!("Invalid secrets service response for '{path}'"),
                e,
            )
        })?;
        Ok(body.data.unwrap_or_default())
    }

    /// Renew the client's own token.
    pub async fn renew_self(&self) -> AppResult<()> {
        let url = format!("{}/v1/auth/token/renew-self", self.address);
        let response = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::SecretResolution, "Token renewal request failed", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::secret(format!("Token renewal rejected with {status}")));
        }
        Ok(())
    }
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("token", &"****")
            .finish()
    }
}
