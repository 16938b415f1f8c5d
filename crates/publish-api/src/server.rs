//! HTTP server lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use publish_core::config::ServerConfig;
use publish_core::error::{AppError, ErrorKind};
use publish_core::result::AppResult;

/// Serve `router` on the configured address until `shutdown` fires.
pub async fn serve(
    config: &ServerConfig,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await.map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Failed to bind {address}"), e)
    })?;
    tracing::info!(address = %address, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "HTTP server failed", e))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
