//! HTTP client for a Vault-compatible secrets service.

pub mod client;

pub use client::VaultClient;
