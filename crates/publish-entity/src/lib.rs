//! # publish-entity
//!
//! Row models for the three relations of the job store. Every struct here
//! maps one table row and derives `sqlx::FromRow`; timestamps are epoch
//! nanoseconds.

pub mod item;
pub mod job;

pub use item::{DeleteItem, FileItem};
pub use job::{Job, JobState, NewJob};
