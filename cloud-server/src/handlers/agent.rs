//! Agent-facing handlers: event submission, decision pickup, liveness ping.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SubmitSuspectRequest {
    /// The agent's own id for this event.
    pub id: u64,
    /// The full wire line, kept verbatim for triage and audit.
    pub message: String,
    pub agent: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitSuspectResponse {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub agent: String,
    /// Comma-separated agent message ids still awaiting a verdict.
    pub ids: String,
}

#[derive(Debug, Serialize)]
pub struct DecisionMessage {
    pub message_id: u64,
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    pub id: String,
}

/// Accept one suspicious-process event. Retransmissions of a still-pending
/// event return the original server id without enqueueing a second entry.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitSuspectRequest>,
) -> AppResult<Json<SubmitSuspectResponse>> {
    if req.agent.trim().is_empty() {
        return Err(AppError::ValidationError("agent must not be empty".to_string()));
    }
    if req.message.trim().is_empty() {
        return Err(AppError::ValidationError("message must not be empty".to_string()));
    }

    let submission = state.queue.submit(&req.agent, req.id, &req.message);
    state.liveness.ping(&req.agent);

    if submission.duplicate {
        tracing::debug!(
            "duplicate submission from {} mapped to existing entry {}",
            req.agent,
            submission.server_id
        );
    } else {
        tracing::info!(
            "suspect from {} queued as entry {} (agent id {})",
            req.agent,
            submission.server_id,
            req.id
        );
    }

    Ok(Json(SubmitSuspectResponse {
        id: submission.server_id,
    }))
}

/// Return staged decisions for the ids the agent still has pending.
pub async fn decisions(
    State(state): State<AppState>,
    Query(query): Query<DecisionQuery>,
) -> AppResult<Json<Vec<DecisionMessage>>> {
    if query.agent.trim().is_empty() {
        return Err(AppError::ValidationError("agent must not be empty".to_string()));
    }

    let ids: Vec<u64> = query
        .ids
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::ValidationError("ids must be a comma-separated list of integers".to_string()))?;

    state.liveness.ping(&query.agent);

    let taken = state.queue.take_staged(&query.agent, &ids);
    let messages = taken
        .into_iter()
        .map(|d| DecisionMessage {
            message_id: d.agent_message_id,
            response: d.response.as_wire().to_string(),
        })
        .collect();

    Ok(Json(messages))
}

/// Liveness ping. Always succeeds; the body names the agent.
pub async fn ping(
    State(state): State<AppState>,
    Json(req): Json<PingRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.id.trim().is_empty() {
        return Err(AppError::ValidationError("id must not be empty".to_string()));
    }
    state.liveness.ping(&req.id);
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
