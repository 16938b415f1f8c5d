//! Work item entities.

pub mod model;

pub use model::{DeleteItem, FileItem};
