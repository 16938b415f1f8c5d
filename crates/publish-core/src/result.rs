//! Convenience result type alias for the publish pipeline.

use crate::error::AppError;

/// A specialized `Result` type for pipeline operations.
pub type AppResult<T> = Result<T, AppError>;
