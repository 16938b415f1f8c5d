//! Wire messages exchanged over the message bus.
//!
//! All messages are JSON with camelCase field names. Inbound messages are
//! decoded with [`decode`], which maps every parse failure to a recoverable
//! error so the consuming loop drops the message instead of stopping.

pub mod completion;
pub mod publish;
pub mod schedule;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::result::AppResult;

pub use completion::{CollectionCompleteMessage, ItemAck, ItemCompleteMessage};
pub use publish::{PublishDeleteMessage, PublishFileMessage};
pub use schedule::{FileResource, ScheduleAction, ScheduleRequest};

/// Decode a JSON payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> AppResult<T> {
    serde_json::from_slice(payload).map_err(AppError::from)
}

/// Encode a message to a JSON payload.
pub fn encode<T: Serialize>(message: &T) -> AppResult<bytes::Bytes> {
    serde_json::to_vec(message)
        .map(bytes::Bytes::from)
        .map_err(AppError::from)
}
