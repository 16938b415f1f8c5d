//! Schedule ingress handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;

use publish_core::messages::ScheduleRequest;

use crate::dto::response::{ApiResponse, ScheduleAcceptedResponse};
use crate::error::ApiResult;
use crate::state::ApiState;

/// POST /api/schedule
///
/// Validates the request and publishes it unchanged to the schedule topic.
/// Admission happens asynchronously in the pipeline.
pub async fn submit(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ApiResponse<ScheduleAcceptedResponse>>)> {
    let request = ScheduleRequest::decode(&body)?;
    request.schedule_time_nanos()?;

    state.schedule.send(body).await?;
    tracing::info!(
        collection_id = %request.collection_id,
        action = ?request.action,
        "Schedule request accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(ScheduleAcceptedResponse {
            collection_id: request.collection_id,
            topic: state.schedule.topic().to_string(),
        })),
    ))
}
