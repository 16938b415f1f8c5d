//! Message bus adapters.

pub mod memory;

pub use memory::{MemoryBus, MemoryCommitLog, MemoryConsumer, MemoryProducer, memory_topic};
