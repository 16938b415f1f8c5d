//! Completion acknowledgements and job-complete events.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::id::{DeleteItemId, FileItemId, JobId};
use crate::types::item::ItemRef;

/// Per-item completion acknowledgement as it appears on the wire.
///
/// `fileId` and `deleteId` are mutually exclusive; zero or absent means
/// "not this kind". Convert to [`ItemAck`] before acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCompleteMessage {
    /// Owning job.
    #[serde(default)]
    pub schedule_id: i64,
    /// Completed file item, if this acknowledges a file.
    #[serde(default)]
    pub file_id: i64,
    /// Completed delete item, if this acknowledges a delete.
    #[serde(default)]
    pub delete_id: i64,
    /// Collection identifier.
    #[serde(default)]
    pub collection_id: String,
}

impl ItemCompleteMessage {
    /// Build the acknowledgement a downstream worker sends for an item.
    pub fn for_item(job_id: JobId, item: ItemRef, collection_id: impl Into<String>) -> Self {
        let (file_id, delete_id) = match item {
            ItemRef::File(id) => (id.get(), 0),
            ItemRef::Delete(id) => (0, id.get()),
        };
        Self {
            schedule_id: job_id.get(),
            file_id,
            delete_id,
            collection_id: collection_id.into(),
        }
    }
}

/// A validated acknowledgement of exactly one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAck {
    /// Owning job.
    pub job_id: JobId,
    /// The acknowledged item.
    pub item: ItemRef,
    /// Collection identifier.
    pub collection_id: String,
}

impl ItemAck {
    /// Decode and validate an acknowledgement payload.
    pub fn decode(payload: &[u8]) -> AppResult<Self> {
        let message: ItemCompleteMessage = super::decode(payload)?;
        Self::try_from(message)
    }
}

impl TryFrom<ItemCompleteMessage> for ItemAck {
    type Error = AppError;

    fn try_from(message: ItemCompleteMessage) -> Result<Self, Self::Error> {
        if message.schedule_id == 0 {
            return Err(AppError::validation(
                "Completion message is missing scheduleId",
            ));
        }
        let item = match (message.file_id, message.delete_id) {
            (0, 0) => {
                return Err(AppError::validation(format!(
                    "Completion for job {} names neither fileId nor deleteId",
                    message.schedule_id
                )));
            }
            (file_id, 0) => ItemRef::File(FileItemId::new(file_id)),
            (0, delete_id) => ItemRef::Delete(DeleteItemId::new(delete_id)),
            (file_id, delete_id) => {
                return Err(AppError::validation(format!(
                    "Completion for job {} names both fileId {file_id} and deleteId {delete_id}",
                    message.schedule_id
                )));
            }
        };
        Ok(Self {
            job_id: JobId::new(message.schedule_id),
            item,
            collection_id: message.collection_id,
        })
    }
}

/// Emitted exactly once when every item of a job has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCompleteMessage {
    /// The completed job.
    pub schedule_id: JobId,
    /// Collection identifier.
    pub collection_id: String,
}
