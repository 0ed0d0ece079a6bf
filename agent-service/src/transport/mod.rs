//! Transport seam: moves suspicion events out and decisions back.
//!
//! Two interchangeable shapes implement the same contract: a persistent
//! line-oriented TCP stream and a polling HTTP client. Both must preserve
//! per-agent submission order on the way out, surface a distinguishable
//! link-loss condition instead of hanging, and reconnect with a bounded
//! delay without an agent restart.
//!
//! The outer [`run`] loop owns the fail-closed policy: when a session ends
//! with a loss, every still-pending local id is synthesized into a Deny and
//! handed to the executor before reconnecting.

pub mod poll;
pub mod stream;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::correlator::Correlator;
use crate::types::{ResolvedDecision, SuspicionEvent, Verdict};

pub use poll::PollTransport;
pub use stream::StreamTransport;

#[derive(Debug)]
pub enum TransportError {
    /// The link to the server is confirmed lost.
    ConnectionLost(String),
    /// The server said something the protocol does not allow.
    Protocol(String),
    /// The local event channel closed: the agent is shutting down.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(e) => write!(f, "connection lost: {}", e),
            Self::Protocol(e) => write!(f, "protocol error: {}", e),
            Self::Closed => write!(f, "event channel closed"),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait Transport: Send {
    fn name(&self) -> &'static str;

    /// Establish a session, retrying internally with a bounded delay until
    /// one is up.
    async fn connect(&mut self);

    /// Run one connected session: concurrently push correlated events and
    /// surface inbound decisions. Returns only when the link is lost or the
    /// agent is shutting down.
    ///
    /// Implementations register an event with the correlator *before*
    /// pushing it, so an event consumed but never delivered is still
    /// pending and therefore covered by the fail-closed sweep.
    async fn run_session(
        &mut self,
        events: &mut mpsc::Receiver<SuspicionEvent>,
        correlator: &Correlator,
        decisions: &mpsc::Sender<ResolvedDecision>,
    ) -> TransportError;
}

/// Drive the transport until shutdown: connect, run a session, and on loss
/// fail closed over the pending set before reconnecting.
pub async fn run(
    mut transport: Box<dyn Transport>,
    mut events: mpsc::Receiver<SuspicionEvent>,
    correlator: Arc<Correlator>,
    decisions: mpsc::Sender<ResolvedDecision>,
    retry_delay: Duration,
) {
    loop {
        transport.connect().await;
        log::info!("{} transport connected", transport.name());

        let err = transport
            .run_session(&mut events, &correlator, &decisions)
            .await;

        if matches!(err, TransportError::Closed) {
            log::info!("transport loop stopped");
            return;
        }
        log::warn!("transport link lost: {}", err);

        // Fail closed: ambiguity never resolves to allow-by-default.
        for (local_id, event) in correlator.fail_all_pending() {
            log::warn!(
                "[AUTO-DENY] synthesizing deny for local id {} after link loss",
                local_id
            );
            let decision = ResolvedDecision {
                local_id,
                verdict: Verdict::Deny,
                event,
            };
            if decisions.send(decision).await.is_err() {
                return;
            }
        }

        log::info!("reconnecting in {:?}...", retry_delay);
        tokio::time::sleep(retry_delay).await;
    }
}
