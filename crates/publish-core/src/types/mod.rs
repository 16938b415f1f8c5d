//! Shared domain types used across all pipeline crates.

pub mod id;
pub mod item;
pub mod time;

pub use id::{DeleteItemId, FileItemId, JobId};
pub use item::{ItemKind, ItemRef};
