//! Job status handler.

use axum::Json;
use axum::extract::{Path, State};

use publish_core::error::AppError;
use publish_core::types::JobId;

use crate::dto::response::{ApiResponse, JobStatusResponse};
use crate::error::ApiResult;
use crate::state::ApiState;

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<JobStatusResponse>>> {
    let job_id = JobId::new(id);
    let job = state
        .store
        .find_job(job_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;
    let counts = state.store.outstanding_counts(job_id).await?;

    Ok(Json(ApiResponse::ok(JobStatusResponse::new(job, counts))))
}
