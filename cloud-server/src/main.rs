//! ProcSentry triage server.
//!
//! Two listeners share one in-memory triage queue:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 PROCSENTRY CLOUD                      │
//! ├───────────────────────────────────────────────────────┤
//! │  ┌───────────────┐        ┌────────────────────────┐  │
//! │  │  HTTP API     │        │  TCP stream listener   │  │
//! │  │  (Axum)       │        │  (line protocol)       │  │
//! │  └───────┬───────┘        └───────────┬────────────┘  │
//! │          └──────────────┬─────────────┘               │
//! │                        ▼                              │
//! │          ┌───────────────────────────┐                │
//! │          │ Triage queue + audit log  │                │
//! │          └───────────────────────────┘                │
//! └───────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procsentry_cloud::audit::AuditLog;
use procsentry_cloud::config::Config;
use procsentry_cloud::liveness::LivenessTracker;
use procsentry_cloud::triage::TriageQueue;
use procsentry_cloud::{create_router, stream, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procsentry_cloud=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("ProcSentry triage server starting...");

    let audit = Arc::new(AuditLog::new(Some(config.audit_path.clone())));
    let state = AppState {
        queue: Arc::new(TriageQueue::new(audit.clone())),
        liveness: Arc::new(LivenessTracker::new(config.liveness_window_secs)),
        audit,
        config: config.clone(),
    };

    let stream_addr = SocketAddr::from(([0, 0, 0, 0], config.stream_port));
    let stream_listener = tokio::net::TcpListener::bind(stream_addr).await?;
    tracing::info!("stream listener on {}", stream_addr);
    tokio::spawn(stream::run(stream_listener, state.clone()));

    let app = create_router(state);
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("HTTP API listening on http://{}", http_addr);

    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
