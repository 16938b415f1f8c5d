//! Shared test helpers for integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use publish_core::config::AppConfig;
use publish_core::messages::{
    CollectionCompleteMessage, ItemCompleteMessage, PublishDeleteMessage, PublishFileMessage,
};
use publish_core::result::AppResult;
use publish_core::traits::MessageConsumer;
use publish_core::types::ItemRef;
use publish_database::MemoryJobStore;
use publish_secrets::StaticSecretResolver;
use publish_worker::bus::{MemoryCommitLog, MemoryConsumer, MemoryProducer, memory_topic};
use publish_worker::{Liveness, PipelineBus, PipelineRunner};

/// How long a test waits for an expected message.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// The collection the static resolver holds a key for.
pub const KEYED_COLLECTION: &str = "c1";

/// Key served for [`KEYED_COLLECTION`]; every other collection gets "".
pub const TEST_KEY: &str = "dGVzdC1rZXk=";

/// Config with fast ticks and no token renewal.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.provider = "memory".to_string();
    config.secrets.provider = "static".to_string();
    config.secrets.renew_interval_minutes = 0;
    config.scheduler.poll_interval_ms = 20;
    config.tracker.reap_interval_ms = 15;
    config.server.enabled = false;
    config
}

/// A running pipeline with the far side of every topic exposed.
pub struct TestPipeline {
    /// The job store the pipeline runs against.
    pub store: Arc<MemoryJobStore>,
    /// Inbound schedule/cancel topic.
    pub schedule: MemoryProducer,
    /// Inbound acknowledgement topic.
    pub item_complete: MemoryProducer,
    /// Outbound publish-file topic.
    pub publish_file: MemoryConsumer,
    /// Outbound publish-delete topic.
    pub publish_delete: MemoryConsumer,
    /// Outbound job-complete topic.
    pub collection_complete: MemoryConsumer,
    /// Commits made by the admission consumer.
    pub schedule_commits: Arc<MemoryCommitLog>,
    /// Commits made by the acknowledgement consumer.
    pub ack_commits: Arc<MemoryCommitLog>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<AppResult<()>>,
}

impl TestPipeline {
    /// Start a pipeline over an empty store.
    pub fn start(config: AppConfig) -> Self {
        Self::start_with_store(config, Arc::new(MemoryJobStore::new()))
    }

    /// Start a pipeline over an existing store.
    pub fn start_with_store(config: AppConfig, store: Arc<MemoryJobStore>) -> Self {
        let capacity = config.bus.capacity;
        let (schedule, schedule_rx) = memory_topic("publish.schedule", capacity);
        let (item_complete, item_complete_rx) = memory_topic("publish.item-complete", capacity);
        let (file_tx, publish_file) = memory_topic("publish.file", capacity);
        let (delete_tx, publish_delete) = memory_topic("publish.delete", capacity);
        let (complete_tx, collection_complete) =
            memory_topic("publish.collection-complete", capacity);

        let schedule_commits = schedule_rx.commit_log();
        let ack_commits = item_complete_rx.commit_log();

        let bus = PipelineBus {
            schedule: Box::new(schedule_rx),
            item_complete: Box::new(item_complete_rx),
            publish_file: Arc::new(file_tx),
            publish_delete: Arc::new(delete_tx),
            collection_complete: Arc::new(complete_tx),
        };

        let keys = HashMap::from([(KEYED_COLLECTION.to_string(), TEST_KEY.to_string())]);
        let secrets = Arc::new(StaticSecretResolver::new(keys));
        let runner = PipelineRunner::new(
            config,
            store.clone(),
            secrets,
            bus,
            Liveness::new(),
        );

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(runner.run(rx));

        Self {
            store,
            schedule,
            item_complete,
            publish_file,
            publish_delete,
            collection_complete,
            schedule_commits,
            ack_commits,
            shutdown,
            handle,
        }
    }

    /// Publish a schedule request for `collection_id` due at `schedule_time`
    /// epoch seconds.
    pub async fn schedule(
        &self,
        collection_id: &str,
        schedule_time: i64,
        files: &[(&str, &str)],
        deletes: &[&str],
    ) -> u64 {
        let files: Vec<Value> = files
            .iter()
            .map(|(location, uri)| json!({"location": location, "uri": uri}))
            .collect();
        let payload = json!({
            "collectionId": collection_id,
            "collectionPath": format!("/collections/{collection_id}"),
            "scheduleTime": schedule_time.to_string(),
            "action": "schedule",
            "files": files,
            "urisToDelete": deletes,
        });
        self.send_raw_schedule(payload.to_string().into_bytes()).await
    }

    /// Publish a cancel request.
    pub async fn cancel(&self, collection_id: &str, schedule_time: i64) -> u64 {
        let payload = json!({
            "collectionId": collection_id,
            "scheduleTime": schedule_time.to_string(),
            "action": "cancel",
        });
        self.send_raw_schedule(payload.to_string().into_bytes()).await
    }

    /// Publish an arbitrary payload on the schedule topic.
    pub async fn send_raw_schedule(&self, payload: Vec<u8>) -> u64 {
        self.schedule.send_at(Bytes::from(payload)).await.unwrap()
    }

    /// Acknowledge a published file.
    pub async fn ack_file(&self, message: &PublishFileMessage) -> u64 {
        let ack = ItemCompleteMessage::for_item(
            message.schedule_id,
            ItemRef::File(message.file_id),
            message.collection_id.clone(),
        );
        self.send_raw_ack(serde_json::to_vec(&ack).unwrap()).await
    }

    /// Acknowledge a published delete.
    pub async fn ack_delete(&self, message: &PublishDeleteMessage) -> u64 {
        let ack = ItemCompleteMessage::for_item(
            message.schedule_id,
            ItemRef::Delete(message.delete_id),
            message.collection_id.clone(),
        );
        self.send_raw_ack(serde_json::to_vec(&ack).unwrap()).await
    }

    /// Publish an arbitrary payload on the acknowledgement topic.
    pub async fn send_raw_ack(&self, payload: Vec<u8>) -> u64 {
        self.item_complete.send_at(Bytes::from(payload)).await.unwrap()
    }

    /// Next publish-file message.
    pub async fn next_file(&mut self) -> PublishFileMessage {
        receive(&mut self.publish_file).await
    }

    /// Next publish-delete message.
    pub async fn next_delete(&mut self) -> PublishDeleteMessage {
        receive(&mut self.publish_delete).await
    }

    /// Next job-complete event.
    pub async fn next_complete(&mut self) -> CollectionCompleteMessage {
        receive(&mut self.collection_complete).await
    }

    /// Assert no job-complete event arrives within `window`.
    pub async fn assert_no_complete(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.collection_complete.next()).await;
        assert!(result.is_err(), "unexpected job-complete event: {result:?}");
    }

    /// Wait until `log` has committed `offset`.
    pub async fn wait_committed(log: &MemoryCommitLog, offset: u64) {
        tokio::time::timeout(RECEIVE_TIMEOUT, async {
            while !log.is_committed(offset) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("offset {offset} was never committed"));
    }

    /// Signal shutdown and return the runner's result.
    pub async fn stop(self) -> AppResult<()> {
        let _ = self.shutdown.send(true);
        self.handle.await.unwrap()
    }

    /// Wait for the runner to stop on its own.
    pub async fn join(self) -> AppResult<()> {
        tokio::time::timeout(RECEIVE_TIMEOUT, self.handle)
            .await
            .expect("pipeline did not stop")
            .unwrap()
    }
}

async fn receive<T: DeserializeOwned>(consumer: &mut MemoryConsumer) -> T {
    let topic = consumer.topic().to_string();
    let message = tokio::time::timeout(RECEIVE_TIMEOUT, consumer.next())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting on {topic}"))
        .expect("topic closed")
        .expect("consumer error");
    message.commit().await.unwrap();
    serde_json::from_slice(message.data()).unwrap()
}

/// Current epoch seconds.
pub fn now_seconds() -> i64 {
    publish_core::types::time::now_nanos() / publish_core::types::time::NANOS_PER_SECOND
}
