//! Response DTOs.

use serde::{Deserialize, Serialize};

use publish_core::types::JobId;
use publish_database::OutstandingCounts;
use publish_entity::{Job, JobState};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"OK"` or `"error"`.
    pub status: String,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outstanding item counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingResponse {
    /// File items not yet acknowledged.
    pub files: i64,
    /// Delete items not yet acknowledged.
    pub deletes: i64,
}

/// Body of `GET /api/jobs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job id.
    pub id: JobId,
    /// Collection id.
    pub collection_id: String,
    /// Collection path.
    pub collection_path: String,
    /// Requested publish time, epoch nanoseconds.
    pub schedule_time: i64,
    /// Claim time.
    pub start_time: Option<i64>,
    /// Completion time.
    pub complete_time: Option<i64>,
    /// Lifecycle state.
    pub state: JobState,
    /// Items still outstanding.
    pub outstanding: OutstandingResponse,
}

impl JobStatusResponse {
    /// Combine a job row with its outstanding counts.
    pub fn new(job: Job, counts: OutstandingCounts) -> Self {
        Self {
            state: job.state(),
            id: job.id,
            collection_id: job.collection_id,
            collection_path: job.collection_path,
            schedule_time: job.schedule_time,
            start_time: job.start_time,
            complete_time: job.complete_time,
            outstanding: OutstandingResponse {
                files: counts.files,
                deletes: counts.deletes,
            },
        }
    }
}

/// Body of `POST /api/schedule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAcceptedResponse {
    /// Collection the request was for.
    pub collection_id: String,
    /// Topic the request was published to.
    pub topic: String,
}
