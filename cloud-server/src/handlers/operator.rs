//! Operator-facing handlers: the triage console API.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::liveness::AgentStatus;
use crate::protocol::Verdict;
use crate::triage::TriageEntry;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    /// "y" to allow, "n" to deny.
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub id: u64,
    pub agent: String,
    pub response: String,
}

/// Pending entries in arrival order.
pub async fn list_pending(State(state): State<AppState>) -> Json<Vec<TriageEntry>> {
    Json(state.queue.list_pending())
}

/// Adjudicate one pending entry.
pub async fn decide(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<DecideRequest>,
) -> AppResult<Json<DecideResponse>> {
    let verdict = Verdict::from_wire(&req.response)
        .ok_or_else(|| AppError::ValidationError("response must be \"y\" or \"n\"".to_string()))?;

    let entry = state.queue.decide(id, verdict)?;
    tracing::info!(
        "entry {} from {} decided: {}",
        entry.server_id,
        entry.origin,
        verdict.as_wire()
    );

    Ok(Json(DecideResponse {
        id: entry.server_id,
        agent: entry.origin,
        response: verdict.as_wire().to_string(),
    }))
}

/// Agents currently inside the liveness window.
pub async fn agents(State(state): State<AppState>) -> Json<Vec<AgentStatus>> {
    Json(state.liveness.statuses())
}

/// The full decision trail, oldest first.
pub async fn audit(State(state): State<AppState>) -> Json<Vec<AuditRecord>> {
    Json(state.audit.records())
}
