//! Message bus configuration.

use serde::{Deserialize, Serialize};

/// Message bus settings and topic names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus provider: only `"memory"` ships in-tree.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Per-topic buffer size for the in-memory bus.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Topic names.
    #[serde(default)]
    pub topics: TopicConfig,
}

/// Topic names for every message the core reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Inbound schedule/cancel requests.
    #[serde(default = "default_schedule_topic")]
    pub schedule: String,
    /// Outbound publish-file messages.
    #[serde(default = "default_publish_file_topic")]
    pub publish_file: String,
    /// Outbound publish-delete messages.
    #[serde(default = "default_publish_delete_topic")]
    pub publish_delete: String,
    /// Inbound per-item completion acknowledgements.
    #[serde(default = "default_item_complete_topic")]
    pub item_complete: String,
    /// Outbound job-complete events.
    #[serde(default = "default_collection_complete_topic")]
    pub collection_complete: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            capacity: default_capacity(),
            topics: TopicConfig::default(),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule_topic(),
            publish_file: default_publish_file_topic(),
            publish_delete: default_publish_delete_topic(),
            item_complete: default_item_complete_topic(),
            collection_complete: default_collection_complete_topic(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_capacity() -> usize {
    1024
}

fn default_schedule_topic() -> String {
    "publish.schedule".to_string()
}

fn default_publish_file_topic() -> String {
    "publish.file".to_string()
}

fn default_publish_delete_topic() -> String {
    "publish.delete".to_string()
}

fn default_item_complete_topic() -> String {
    "publish.item-complete".to_string()
}

fn default_collection_complete_topic() -> String {
    "publish.collection-complete".to_string()
}
