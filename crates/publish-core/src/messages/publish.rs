//! Outbound per-item publish messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::id::{DeleteItemId, FileItemId, JobId};

/// Instructs the downstream decrypt/upload worker to publish one file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishFileMessage {
    /// Owning job.
    pub schedule_id: JobId,
    /// The file item being published.
    pub file_id: FileItemId,
    /// Collection identifier.
    pub collection_id: String,
    /// Collection path in the content store.
    pub collection_path: String,
    /// Decryption key for the collection's content.
    pub encryption_key: String,
    /// Source location of the file.
    pub file_location: String,
    /// Target URI.
    pub uri: String,
}

impl fmt::Debug for PublishFileMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishFileMessage")
            .field("schedule_id", &self.schedule_id)
            .field("file_id", &self.file_id)
            .field("collection_id", &self.collection_id)
            .field("collection_path", &self.collection_path)
            .field("encryption_key", &"****")
            .field("file_location", &self.file_location)
            .field("uri", &self.uri)
            .finish()
    }
}

/// Instructs the downstream retraction worker to delete one URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDeleteMessage {
    /// Owning job.
    pub schedule_id: JobId,
    /// The delete item being processed.
    pub delete_id: DeleteItemId,
    /// URI to retract.
    pub uri: String,
    /// Collection identifier.
    pub collection_id: String,
}
