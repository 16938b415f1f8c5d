//! # publish-core
//!
//! Core crate for the publish pipeline. Contains the unified error system,
//! configuration schemas, typed identifiers, the wire messages exchanged
//! over the message bus, and the traits implemented by the bus and
//! secrets-service adapters.
//!
//! This crate has **no** internal dependencies on other pipeline crates.

pub mod config;
pub mod error;
pub mod messages;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
