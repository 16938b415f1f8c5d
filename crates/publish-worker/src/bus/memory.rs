//! Bounded in-process topics.
//!
//! Each topic is a tokio mpsc channel. Offsets are assigned on send and the
//! consumer records commits in a shared [`MemoryCommitLog`], so callers can
//! check what a loop acknowledged. Once every producer is dropped the
//! consumer drains the remaining messages and then reports the topic closed.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use publish_core::config::BusConfig;
use publish_core::error::AppError;
use publish_core::result::AppResult;
use publish_core::traits::{InboundMessage, MessageConsumer, MessageProducer, OffsetCommitter};

#[derive(Debug)]
enum Delivery {
    Message { offset: u64, payload: Bytes },
    Failure(String),
}

/// Offsets committed on one topic.
#[derive(Debug, Default)]
pub struct MemoryCommitLog {
    committed: Mutex<BTreeSet<u64>>,
}

impl MemoryCommitLog {
    /// Whether `offset` has been committed.
    pub fn is_committed(&self, offset: u64) -> bool {
        self.committed
            .lock()
            .map(|c| c.contains(&offset))
            .unwrap_or(false)
    }

    /// All committed offsets, ascending.
    pub fn committed(&self) -> Vec<u64> {
        self.committed
            .lock()
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OffsetCommitter for MemoryCommitLog {
    async fn commit(&self, offset: u64) -> AppResult<()> {
        self.committed
            .lock()
            .map_err(|_| AppError::bus("Commit log lock poisoned"))?
            .insert(offset);
        Ok(())
    }
}

/// Sending half of a memory topic.
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    topic: Arc<str>,
    sender: mpsc::Sender<Delivery>,
    next_offset: Arc<AtomicU64>,
}

impl MemoryProducer {
    /// Send and return the assigned offset.
    pub async fn send_at(&self, payload: Bytes) -> AppResult<u64> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.sender
            .send(Delivery::Message { offset, payload })
            .await
            .map_err(|_| AppError::bus(format!("Topic '{}' is closed", self.topic)))?;
        Ok(offset)
    }

    /// Make the consumer report a bus failure on its next read.
    pub async fn inject_failure(&self, reason: impl Into<String>) -> AppResult<()> {
        self.sender
            .send(Delivery::Failure(reason.into()))
            .await
            .map_err(|_| AppError::bus(format!("Topic '{}' is closed", self.topic)))
    }
}

#[async_trait]
impl MessageProducer for MemoryProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, payload: Bytes) -> AppResult<()> {
        self.send_at(payload).await.map(|_| ())
    }
}

/// Receiving half of a memory topic.
#[derive(Debug)]
pub struct MemoryConsumer {
    topic: Arc<str>,
    receiver: mpsc::Receiver<Delivery>,
    commits: Arc<MemoryCommitLog>,
}

impl MemoryConsumer {
    /// The commit log shared with every message this consumer yields.
    pub fn commit_log(&self) -> Arc<MemoryCommitLog> {
        Arc::clone(&self.commits)
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next(&mut self) -> Option<AppResult<InboundMessage>> {
        match self.receiver.recv().await? {
            Delivery::Message { offset, payload } => Some(Ok(InboundMessage::new(
                self.topic.as_ref(),
                offset,
                payload,
                Arc::clone(&self.commits) as Arc<dyn OffsetCommitter>,
            ))),
            Delivery::Failure(reason) => Some(Err(AppError::bus(format!(
                "Consumer error on '{}': {reason}",
                self.topic
            )))),
        }
    }
}

/// Create one bounded topic.
pub fn memory_topic(name: &str, capacity: usize) -> (MemoryProducer, MemoryConsumer) {
    let (sender, receiver) = mpsc::channel(capacity);
    let topic: Arc<str> = Arc::from(name);
    (
        MemoryProducer {
            topic: Arc::clone(&topic),
            sender,
            next_offset: Arc::new(AtomicU64::new(0)),
        },
        MemoryConsumer {
            topic,
            receiver,
            commits: Arc::new(MemoryCommitLog::default()),
        },
    )
}

/// The pipeline's topics, created from configuration.
#[derive(Debug)]
pub struct MemoryBus {
    producers: HashMap<String, MemoryProducer>,
    consumers: Mutex<HashMap<String, MemoryConsumer>>,
}

impl MemoryBus {
    /// Create every configured topic.
    pub fn new(config: &BusConfig) -> Self {
        let topics = &config.topics;
        let names = [
            &topics.schedule,
            &topics.publish_file,
            &topics.publish_delete,
            &topics.item_complete,
            &topics.collection_complete,
        ];

        let mut producers = HashMap::new();
        let mut consumers = HashMap::new();
        for name in names {
            let (producer, consumer) = memory_topic(name, config.capacity);
            producers.insert(name.clone(), producer);
            consumers.insert(name.clone(), consumer);
        }

        Self {
            producers,
            consumers: Mutex::new(consumers),
        }
    }

    /// A producer for `topic`.
    pub fn producer(&self, topic: &str) -> AppResult<MemoryProducer> {
        self.producers
            .get(topic)
            .cloned()
            .ok_or_else(|| AppError::bus(format!("Unknown topic '{topic}'")))
    }

    /// Take the single consumer of `topic`.
    pub fn take_consumer(&self, topic: &str) -> AppResult<MemoryConsumer> {
        self.consumers
            .lock()
            .map_err(|_| AppError::bus("Bus lock poisoned"))?
            .remove(topic)
            .ok_or_else(|| AppError::bus(format!("Consumer for '{topic}' already taken")))
    }
}
