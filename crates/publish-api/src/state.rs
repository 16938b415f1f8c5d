//! State shared by all handlers.

use std::sync::Arc;
use std::time::Duration;

use publish_core::traits::MessageProducer;
use publish_database::JobStore;
use publish_worker::Liveness;

/// Handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Job store.
    pub store: Arc<dyn JobStore>,
    /// Loop heartbeats.
    pub liveness: Liveness,
    /// How long a loop may go without ticking before health fails.
    pub liveness_grace: Duration,
    /// Producer for the schedule topic.
    pub schedule: Arc<dyn MessageProducer>,
}
