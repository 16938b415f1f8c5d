//! Inbound schedule/cancel requests.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::time::seconds_to_nanos;

/// What the sender wants done with the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleAction {
    /// Publish the collection at the schedule time.
    Schedule,
    /// Withdraw a not-yet-started publish.
    Cancel,
}

/// One file to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    /// Where the (encrypted) source content lives.
    #[serde(default)]
    pub location: String,
    /// The URI it is published under.
    #[serde(default)]
    pub uri: String,
}

/// A request to schedule or cancel the publish of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    /// Collection identifier.
    #[validate(length(min = 1, message = "collectionId is required"))]
    pub collection_id: String,
    /// Collection path in the content store.
    #[serde(default)]
    pub collection_path: String,
    /// Publish time as a decimal string of epoch seconds.
    pub schedule_time: String,
    /// Schedule or cancel.
    pub action: ScheduleAction,
    /// Files to publish.
    #[serde(default)]
    pub files: Vec<FileResource>,
    /// URIs to retract.
    #[serde(default)]
    pub uris_to_delete: Vec<String>,
}

impl ScheduleRequest {
    /// Decode and validate a request payload.
    pub fn decode(payload: &[u8]) -> AppResult<Self> {
        let request: Self = super::decode(payload)?;
        request.validate()?;
        Ok(request)
    }

    /// The schedule time in epoch nanoseconds.
    pub fn schedule_time_nanos(&self) -> AppResult<i64> {
        let seconds: i64 = self.schedule_time.trim().parse().map_err(|_| {
            AppError::validation(format!(
                "Collection {:?} scheduleTime {:?} is not numeric",
                self.collection_id, self.schedule_time
            ))
        })?;
        seconds_to_nanos(seconds).ok_or_else(|| {
            AppError::validation(format!(
                "Collection {:?} scheduleTime {seconds} is out of range",
                self.collection_id
            ))
        })
    }
}
