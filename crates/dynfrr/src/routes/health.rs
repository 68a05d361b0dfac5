//! Health and status endpoints.

use axum::{Json, extract::State};
use serde::Serialize;

use runtimecfg_common::WatchStatus;

use crate::state::WatchState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the process running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Monitor and control channel status
pub async fn status(State(state): State<WatchState>) -> Json<WatchStatus> {
    Json(state.snapshot().await)
}
