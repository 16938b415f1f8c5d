//! Route definitions.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::ApiState;

/// Build the router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/schedule", post(handlers::schedule::submit));

    Router::new()
        .route("/healthcheck", get(handlers::health::healthcheck))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
