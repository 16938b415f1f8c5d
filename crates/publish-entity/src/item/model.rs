//! File and delete item models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use publish_core::types::{DeleteItemId, FileItemId, ItemRef, JobId};

/// Content to publish, owned by one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FileItem {
    /// Store-assigned item identifier.
    pub id: FileItemId,
    /// Owning job.
    pub job_id: JobId,
    /// Target URI.
    pub uri: String,
    /// Source location.
    pub file_location: String,
    /// When the item was acknowledged complete.
    pub complete_time: Option<i64>,
}

impl FileItem {
    /// Reference used to correlate acknowledgements.
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::File(self.id)
    }
}

/// A URI to retract, owned by one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DeleteItem {
    /// Store-assigned item identifier.
    pub id: DeleteItemId,
    /// Owning job.
    pub job_id: JobId,
    /// URI to retract.
    pub uri: String,
    /// When the item was acknowledged complete.
    pub complete_time: Option<i64>,
}

impl DeleteItem {
    /// Reference used to correlate acknowledgements.
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::Delete(self.id)
    }
}
