//! Core traits defined in `publish-core` and implemented by other crates.

pub mod bus;
pub mod secrets;

pub use bus::{InboundMessage, MessageConsumer, MessageProducer, OffsetCommitter};
pub use secrets::SecretResolver;
