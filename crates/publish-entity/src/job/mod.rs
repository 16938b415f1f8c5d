//! Publish job entities.

pub mod model;
pub mod state;

pub use model::{Job, NewJob};
pub use state::JobState;
