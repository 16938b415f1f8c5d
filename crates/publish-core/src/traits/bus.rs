//! Message bus seam.
//!
//! The bus is assumed to deliver at least once and to track consumer-group
//! offsets. Producers hand a payload to a topic; consumers yield
//! [`InboundMessage`]s that must be committed once they have been handled.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;

/// Publishes payloads to one topic.
#[async_trait]
pub trait MessageProducer: Send + Sync + fmt::Debug + 'static {
    /// The topic this producer writes to.
    fn topic(&self) -> &str;

    /// Hand a payload to the bus. May wait under bus backpressure.
    async fn send(&self, payload: Bytes) -> AppResult<()>;
}

/// Records that a consumer group has handled a message.
#[async_trait]
pub trait OffsetCommitter: Send + Sync + fmt::Debug + 'static {
    /// Mark the message at `offset` as handled.
    async fn commit(&self, offset: u64) -> AppResult<()>;
}

/// Reads messages from one topic as part of a consumer group.
#[async_trait]
pub trait MessageConsumer: Send + fmt::Debug + 'static {
    /// The topic this consumer reads.
    fn topic(&self) -> &str;

    /// Wait for the next message. `None` means the topic was closed; an
    /// `Err` is a consumer failure.
    async fn next(&mut self) -> Option<AppResult<InboundMessage>>;
}

/// A message delivered to a consumer.
#[derive(Clone)]
pub struct InboundMessage {
    topic: String,
    offset: u64,
    payload: Bytes,
    committer: Arc<dyn OffsetCommitter>,
}

impl InboundMessage {
    /// Create a message bound to the committer that acknowledges it.
    pub fn new(
        topic: impl Into<String>,
        offset: u64,
        payload: Bytes,
        committer: Arc<dyn OffsetCommitter>,
    ) -> Self {
        Self {
            topic: topic.into(),
            offset,
            payload,
            committer,
        }
    }

    /// Source topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Position within the topic.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    /// Acknowledge the message to the bus.
    pub async fn commit(&self) -> AppResult<()> {
        self.committer.commit(self.offset).await
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("topic", &self.topic)
            .field("offset", &self.offset)
            .field("len", &self.payload.len())
            .finish()
    }
}
