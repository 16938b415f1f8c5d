//! # publish-secrets
//!
//! Resolves the per-collection decryption key the dispatcher attaches to
//! every outbound file message. The production resolver reads a Vault-style
//! secrets service over HTTP and keeps its token alive with
//! [`SecretResolver::renew`](publish_core::traits::SecretResolver::renew).

pub mod provider;
pub mod resolver;
pub mod vault;

pub use provider::build_resolver;
pub use resolver::{StaticSecretResolver, VaultSecretResolver};
pub use vault::VaultClient;
