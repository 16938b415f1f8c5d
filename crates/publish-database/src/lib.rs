//! # publish-database
//!
//! The job store: the single source of truth for job and item state.
//! [`JobStore`] is the seam every pipeline component talks to; the
//! PostgreSQL [`JobRepository`] is the production implementation and
//! [`MemoryJobStore`] provides the same atomic semantics in-process.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod provider;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryJobStore;
pub use provider::connect_store;
pub use repositories::JobRepository;
pub use store::{ClaimRequest, CompletedJob, ItemUpdate, JobStore, OutstandingCounts, ScheduledJob};
