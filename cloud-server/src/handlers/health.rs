//! Health check handler

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    pending: usize,
    agents_online: usize,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        pending: state.queue.pending_len(),
        agents_online: state.liveness.online_count(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
