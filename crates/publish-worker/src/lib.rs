//! # publish-worker
//!
//! The long-running loops of the pipeline: admission of schedule/cancel
//! requests, the claim poller, the dispatch pool, and the completion
//! tracker (acknowledgement consumer plus reaper). [`PipelineRunner`] wires
//! them together under one shutdown signal.

pub mod admission;
pub mod bus;
pub mod dispatcher;
pub mod heartbeat;
pub mod maintenance;
pub mod poller;
pub mod runner;
pub mod tracker;

pub use admission::{Admission, AdmissionHandler};
pub use dispatcher::{DispatchJob, Dispatcher};
pub use heartbeat::{Heartbeat, Liveness};
pub use maintenance::MaintenanceScheduler;
pub use poller::ClaimPoller;
pub use runner::{PipelineBus, PipelineRunner};
pub use tracker::CompletionTracker;
