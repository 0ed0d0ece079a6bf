//! ProcSentry Cloud - central triage server.
//!
//! Receives suspicion events from agents over either transport flavor (a
//! persistent TCP line stream or the polling HTTP API), deduplicates them
//! into one shared triage queue, lets a human operator adjudicate each
//! entry, and stages the decisions for delivery back over the originating
//! transport. Every decision is recorded in an append-only audit log.

pub mod audit;
pub mod config;
pub mod error;
pub mod handlers;
pub mod liveness;
pub mod protocol;
pub mod stream;
pub mod triage;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub queue: Arc<triage::TriageQueue>,
    pub liveness: Arc<liveness::LivenessTracker>,
    pub audit: Arc<audit::AuditLog>,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Agent routes (poll transport + heartbeat)
    let agent_routes = Router::new()
        .route("/api/suspects", post(handlers::agent::submit))
        .route("/api/decisions", get(handlers::agent::decisions))
        .route("/api/ping", post(handlers::agent::ping));

    // Operator routes (triage console)
    let operator_routes = Router::new()
        .route("/api/pending", get(handlers::operator::list_pending))
        .route("/api/pending/:id/decide", post(handlers::operator::decide))
        .route("/api/agents", get(handlers::operator::agents))
        .route("/api/audit", get(handlers::operator::audit));

    Router::new()
        .route("/health", get(handlers::health::check))
        .merge(agent_routes)
        .merge(operator_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
