//! Health check handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use publish_core::types::time::now_nanos;

use crate::dto::response::HealthResponse;
use crate::state::ApiState;

/// GET /healthcheck
///
/// Healthy when the store answers and both ticking loops are alive.
pub async fn healthcheck(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let verdict = match state.store.health_check().await {
        Ok(true) => state.liveness.check(now_nanos(), state.liveness_grace),
        Ok(false) => Err("job store is not healthy".to_string()),
        Err(e) => Err(format!("job store: {e}")),
    };

    match verdict {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".to_string(),
                error: None,
            }),
        ),
        Err(reason) => {
            tracing::warn!(reason = %reason, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error".to_string(),
                    error: Some(reason),
                }),
            )
        }
    }
}
