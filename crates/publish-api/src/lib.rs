//! # publish-api
//!
//! A thin axum surface over the pipeline: the liveness endpoint polled by
//! the process supervisor, a job status lookup, and an ingress that puts
//! schedule requests on the bus.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use router::build_router;
pub use server::serve;
pub use state::ApiState;
