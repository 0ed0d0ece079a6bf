//! Polling HTTP transport.
//!
//! Events are submitted individually; decisions are fetched on a fixed
//! interval by listing the still-pending local ids. Decisions carry their
//! id explicitly, so a batch may resolve out of submission order; ordering
//! is only guaranteed within one batch.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::correlator::Correlator;
use crate::types::{ResolvedDecision, SuspicionEvent, Verdict};
use crate::wire;

use super::{Transport, TransportError};

// Request/Response types (mirrored by the server)

#[derive(Debug, Serialize)]
struct SubmitSuspectRequest<'a> {
    id: u64,
    message: &'a str,
    agent: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitSuspectResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DecisionMessage {
    message_id: u64,
    response: String,
}

pub struct PollTransport {
    base_url: String,
    agent: String,
    poll_interval: Duration,
    retry_delay: Duration,
    http: reqwest::Client,
}

impl PollTransport {
    pub fn new(
        base_url: String,
        agent: String,
        poll_interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url,
            agent,
            poll_interval,
            retry_delay,
            http,
        }
    }

    async fn submit(&self, local_id: u64, message: &str) -> Result<u64, TransportError> {
        let url = format!("{}/api/suspects", self.base_url);
        let request = SubmitSuspectRequest {
            id: local_id,
            message,
            agent: &self.agent,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::ConnectionLost(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: SubmitSuspectResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(body.id)
    }

    async fn fetch_decisions(
        &self,
        pending: &[u64],
    ) -> Result<Vec<DecisionMessage>, TransportError> {
        let ids = pending
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/api/decisions", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("agent", self.agent.as_str()), ("ids", ids.as_str())])
            .send()
            .await
            .map_err(|e| TransportError::ConnectionLost(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::ConnectionLost(format!(
                "server returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl Transport for PollTransport {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn connect(&mut self) {
        // The poll flavor is connectionless; probe the health endpoint so
        // "connected" means the server is actually reachable.
        let url = format!("{}/health", self.base_url);
        loop {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) => log::warn!(
                    "server health returned {}, retrying in {:?}",
                    response.status(),
                    self.retry_delay
                ),
                Err(e) => log::warn!(
                    "server unreachable: {}, retrying in {:?}",
                    e, self.retry_delay
                ),
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn run_session(
        &mut self,
        events: &mut mpsc::Receiver<SuspicionEvent>,
        correlator: &Correlator,
        decisions: &mpsc::Sender<ResolvedDecision>,
    ) -> TransportError {
        let mut pickup = tokio::time::interval(self.poll_interval);
        pickup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let local_id = correlator.register(event.clone());
                        let message = wire::format_suspect_line(local_id, &event);
                        match self.submit(local_id, &message).await {
                            Ok(server_id) => log::info!(
                                "submitted suspicion id {} (server id {})",
                                local_id, server_id
                            ),
                            Err(e) => return e,
                        }
                    }
                    None => return TransportError::Closed,
                },

                _ = pickup.tick() => {
                    let pending = correlator.pending_ids();
                    if pending.is_empty() {
                        continue;
                    }
                    let batch = match self.fetch_decisions(&pending).await {
                        Ok(batch) => batch,
                        Err(e) => return e,
                    };
                    for message in batch {
                        let Some(verdict) = Verdict::from_wire(&message.response) else {
                            log::warn!(
                                "malformed decision response '{}' for id {}, dropping",
                                message.response, message.message_id
                            );
                            continue;
                        };
                        if let Some(event) = correlator.resolve(message.message_id) {
                            let decision = ResolvedDecision {
                                local_id: message.message_id,
                                verdict,
                                event,
                            };
                            if decisions.send(decision).await.is_err() {
                                return TransportError::Closed;
                            }
                        }
                    }
                }
            }
        }
    }
}
