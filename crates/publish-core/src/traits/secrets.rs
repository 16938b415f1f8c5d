//! Secret resolver trait for the per-collection decryption key.

use async_trait::async_trait;

use crate::result::AppResult;

/// Looks up the decryption key of a collection at dispatch time.
#[async_trait]
pub trait SecretResolver: Send + Sync + std::fmt::Debug + 'static {
    /// Resolver type name (e.g., "vault", "static").
    fn provider_type(&self) -> &str;

    /// Return the collection's key. A collection with no stored key
    /// resolves to an empty string.
    async fn resolve_key(&self, collection_id: &str) -> AppResult<String>;

    /// Renew the resolver's own credentials, if it has any.
    async fn renew(&self) -> AppResult<()> {
        Ok(())
    }
}
