//! HTTP status endpoint for dynfrr.

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::state::WatchState;

mod health;

/// Create the status router
pub fn create_router(state: WatchState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/status", get(health::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the status endpoint until shutdown is broadcast
pub async fn serve_status(
    addr: &str,
    state: WatchState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status endpoint on {addr}"))?;
    tracing::info!(addr = addr, "Status endpoint listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .context("Status server error")?;

    Ok(())
}
