//! Server triage queue.
//!
//! One queue shared by every connected agent. The server assigns its own
//! ids (a numbering space independent of any agent's local ids), so two
//! agents can both submit "ID:1" without collision. Deduplication is by
//! (origin agent identity, raw payload): a retransmission of a
//! still-pending event never produces a second entry.
//!
//! Decided entries leave pending atomically, gain one immutable audit
//! record, and are staged for delivery back over the originating
//! transport. Poll agents address decisions by id, so their staged
//! decisions are retained until fetched at least once. Stream agents deny
//! every in-flight event locally when the link drops, so anything retained
//! for a stream origin is stale by the time it reconnects and is purged
//! when its new session opens.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::audit::{AuditLog, AuditRecord};
use crate::protocol::Verdict;

/// Upper bound on decisions staged per origin. An origin that stops
/// fetching loses its oldest staged decisions first.
const STAGED_PER_ORIGIN_CAP: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct TriageEntry {
    pub server_id: u64,
    pub origin: String,
    pub agent_message_id: u64,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// A decision staged for pickup by its origin agent.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedDecision {
    pub agent_message_id: u64,
    pub response: Verdict,
}

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("no pending entry with id {0}")]
    NotFound(u64),
}

/// Outcome of a submission.
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub server_id: u64,
    pub duplicate: bool,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    /// Pending entries in arrival order.
    pending: Vec<TriageEntry>,
    /// (origin, raw message) -> server id, for retransmission dedup.
    dedup: HashMap<(String, String), u64>,
    /// Decisions staged per origin, oldest first.
    staged: HashMap<String, Vec<StagedDecision>>,
}

pub struct TriageQueue {
    state: Mutex<QueueState>,
    audit: Arc<AuditLog>,
    /// Wakes stream sessions when a decision is staged for some origin.
    decided_tx: broadcast::Sender<String>,
}

impl TriageQueue {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        let (decided_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(QueueState {
                next_id: 1,
                ..QueueState::default()
            }),
            audit,
            decided_tx,
        }
    }

    /// Subscribe to staging notifications (the payload is the origin).
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.decided_tx.subscribe()
    }

    /// Accept one inbound event. A duplicate of a still-pending event
    /// returns the existing server id and enqueues nothing.
    pub fn submit(&self, origin: &str, agent_message_id: u64, message: &str) -> Submission {
        let mut state = self.state.lock();
        let key = (origin.to_string(), message.to_string());

        if let Some(&server_id) = state.dedup.get(&key) {
            return Submission {
                server_id,
                duplicate: true,
            };
        }

        let server_id = state.next_id;
        state.next_id += 1;
        state.dedup.insert(key, server_id);
        state.pending.push(TriageEntry {
            server_id,
            origin: origin.to_string(),
            agent_message_id,
            message: message.to_string(),
            received_at: Utc::now(),
        });

        Submission {
            server_id,
            duplicate: false,
        }
    }

    /// Pending entries in arrival order.
    pub fn list_pending(&self) -> Vec<TriageEntry> {
        self.state.lock().pending.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Adjudicate one entry: remove from pending and the dedup set, append
    /// an audit record, stage the decision for the origin agent, and wake
    /// any stream session serving that origin.
    pub fn decide(&self, server_id: u64, verdict: Verdict) -> Result<TriageEntry, TriageError> {
        let entry = {
            let mut state = self.state.lock();
            let idx = state
                .pending
                .iter()
                .position(|e| e.server_id == server_id)
                .ok_or(TriageError::NotFound(server_id))?;
            let entry = state.pending.remove(idx);

            state
                .dedup
                .remove(&(entry.origin.clone(), entry.message.clone()));
            let staged = state.staged.entry(entry.origin.clone()).or_default();
            staged.push(StagedDecision {
                agent_message_id: entry.agent_message_id,
                response: verdict,
            });
            if staged.len() > STAGED_PER_ORIGIN_CAP {
                let overflow = staged.len() - STAGED_PER_ORIGIN_CAP;
                staged.drain(..overflow);
                tracing::warn!(
                    "origin {} exceeded the staged decision cap, dropped {} oldest",
                    entry.origin,
                    overflow
                );
            }
            entry
        };

        self.audit.append(AuditRecord {
            id: entry.server_id,
            agent: entry.origin.clone(),
            message: entry.message.clone(),
            response: verdict.as_wire().to_string(),
            timestamp: Utc::now(),
        });

        // Subscribers may be absent (no stream session up): fine.
        let _ = self.decided_tx.send(entry.origin.clone());
        Ok(entry)
    }

    /// Poll pickup: remove and return staged decisions for `origin` whose
    /// agent message id is in the requested set. Unrequested decisions stay
    /// staged for a later fetch.
    pub fn take_staged(&self, origin: &str, ids: &[u64]) -> Vec<StagedDecision> {
        let mut state = self.state.lock();
        let Some(staged) = state.staged.get_mut(origin) else {
            return Vec::new();
        };

        let mut taken = Vec::new();
        staged.retain(|d| {
            if ids.contains(&d.agent_message_id) {
                taken.push(d.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Stream pickup: remove and return the staged decisions that can be
    /// delivered in submission order. The stream reply carries no id, so a
    /// decision is held back while an *earlier* submission from the same
    /// origin is still undecided; otherwise the agent's FIFO matching
    /// would pair the reply with the wrong event.
    pub fn take_deliverable_staged(&self, origin: &str) -> Vec<StagedDecision> {
        let mut state = self.state.lock();

        let min_pending = state
            .pending
            .iter()
            .filter(|e| e.origin == origin)
            .map(|e| e.agent_message_id)
            .min();

        let Some(staged) = state.staged.get_mut(origin) else {
            return Vec::new();
        };
        staged.sort_by_key(|d| d.agent_message_id);

        let cut = match min_pending {
            Some(min) => staged
                .iter()
                .take_while(|d| d.agent_message_id < min)
                .count(),
            None => staged.len(),
        };
        staged.drain(..cut).collect()
    }

    /// Drop every pending entry and staged decision for `origin`.
    ///
    /// Called when a stream origin opens a new session. The agent denied
    /// all of its in-flight events on the link loss, so retained records
    /// refer to events that no longer exist on the agent; delivering one
    /// would be matched against the wrong event by the agent's in-order
    /// reply pairing. Returns (dropped pending, dropped staged).
    pub fn purge_origin(&self, origin: &str) -> (usize, usize) {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.retain(|e| e.origin != origin);
        let dropped_pending = before - state.pending.len();
        state.dedup.retain(|(o, _), _| o != origin);
        let dropped_staged = state.staged.remove(origin).map_or(0, |s| s.len());
        (dropped_pending, dropped_staged)
    }

    /// Put taken-but-undelivered decisions back at the front of the staged
    /// queue (a stream write failed mid-flush).
    pub fn restage(&self, origin: &str, decisions: Vec<StagedDecision>) {
        if decisions.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let staged = state.staged.entry(origin.to_string()).or_default();
        let rest = std::mem::take(staged);
        staged.extend(decisions);
        staged.extend(rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> TriageQueue {
        TriageQueue::new(Arc::new(AuditLog::new(None)))
    }

    const MSG: &str = r"[SUSPEITO] ID:1|Name:cmd.exe|Path:C:\u\cmd.exe|PID:4321|IP:10.0.0.2|Host:WKS-01";

    #[test]
    fn duplicate_submission_enqueues_once() {
        let q = queue();
        let first = q.submit("WKS-01", 1, MSG);
        let second = q.submit("WKS-01", 1, MSG);

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.server_id, second.server_id);
        assert_eq!(q.pending_len(), 1);
    }

    #[test]
    fn identical_payloads_from_distinct_origins_are_distinct_entries() {
        let q = queue();
        let a = q.submit("WKS-01", 1, MSG);
        let b = q.submit("WKS-02", 1, MSG);

        assert!(!b.duplicate);
        assert_ne!(a.server_id, b.server_id);
        assert_eq!(q.pending_len(), 2);
    }

    #[test]
    fn server_ids_are_their_own_numbering_space() {
        let q = queue();
        // Agent message ids start wherever the agent likes; server ids are
        // assigned sequentially from 1 regardless.
        let s = q.submit("WKS-01", 900, "payload-a");
        assert_eq!(s.server_id, 1);
        let s = q.submit("WKS-02", 900, "payload-b");
        assert_eq!(s.server_id, 2);
    }

    #[test]
    fn decide_removes_stages_and_audits_exactly_once() {
        let audit = Arc::new(AuditLog::new(None));
        let q = TriageQueue::new(audit.clone());
        let submission = q.submit("WKS-01", 1, MSG);

        let entry = q.decide(submission.server_id, Verdict::Allow).expect("pending");
        assert_eq!(entry.server_id, submission.server_id);
        assert_eq!(q.pending_len(), 0);

        // Audit gained exactly one record with response "y".
        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, "y");
        assert_eq!(records[0].agent, "WKS-01");

        // Second decide on the same id: consumed, gone.
        assert!(q.decide(submission.server_id, Verdict::Deny).is_err());
    }

    #[test]
    fn decide_unknown_id_is_an_error() {
        let q = queue();
        assert!(matches!(q.decide(42, Verdict::Deny), Err(TriageError::NotFound(42))));
    }

    #[test]
    fn resubmission_after_decision_is_a_new_entry() {
        let q = queue();
        let first = q.submit("WKS-01", 1, MSG);
        q.decide(first.server_id, Verdict::Deny).expect("pending");

        // The dedup key was released with the decision.
        let again = q.submit("WKS-01", 1, MSG);
        assert!(!again.duplicate);
        assert_ne!(again.server_id, first.server_id);
    }

    #[test]
    fn poll_pickup_filters_by_requested_ids_and_survives_until_fetched() {
        let q = queue();
        let a = q.submit("WKS-01", 1, "payload-a");
        let b = q.submit("WKS-01", 2, "payload-b");
        q.decide(a.server_id, Verdict::Allow).expect("a");
        q.decide(b.server_id, Verdict::Deny).expect("b");

        // The agent only asks for id 2; id 1 must stay staged.
        let taken = q.take_staged("WKS-01", &[2]);
        assert_eq!(taken, vec![StagedDecision { agent_message_id: 2, response: Verdict::Deny }]);

        // Still retrievable later (e.g. after a reconnect).
        let taken = q.take_staged("WKS-01", &[1, 2]);
        assert_eq!(taken, vec![StagedDecision { agent_message_id: 1, response: Verdict::Allow }]);

        // Fetched once: gone.
        assert!(q.take_staged("WKS-01", &[1, 2]).is_empty());
    }

    #[test]
    fn stream_pickup_holds_back_out_of_order_decisions() {
        let q = queue();
        let first = q.submit("WKS-01", 1, "payload-a");
        let second = q.submit("WKS-01", 2, "payload-b");

        // Operator decides the *second* submission first. The bare y/n
        // reply would be FIFO-matched by the agent, so it must wait.
        q.decide(second.server_id, Verdict::Deny).expect("second");
        assert!(q.take_deliverable_staged("WKS-01").is_empty());

        // Once the earlier one is decided, both flow out in order.
        q.decide(first.server_id, Verdict::Allow).expect("first");
        let delivered = q.take_deliverable_staged("WKS-01");
        assert_eq!(
            delivered,
            vec![
                StagedDecision { agent_message_id: 1, response: Verdict::Allow },
                StagedDecision { agent_message_id: 2, response: Verdict::Deny },
            ]
        );
    }

    #[test]
    fn purge_drops_everything_retained_for_the_origin() {
        let q = queue();
        let first = q.submit("WKS-01", 1, "payload-a");
        q.submit("WKS-01", 2, "payload-b");
        q.submit("WKS-02", 1, "payload-c");
        // Decided after the agent's link dropped: the agent already denied
        // the event locally, so this verdict must never reach it.
        q.decide(first.server_id, Verdict::Allow).expect("first");

        let (dropped_pending, dropped_staged) = q.purge_origin("WKS-01");
        assert_eq!((dropped_pending, dropped_staged), (1, 1));

        // A fresh submission from the reconnected agent sees only its own
        // verdicts, even though it is now the oldest pending entry.
        let fresh = q.submit("WKS-01", 3, "payload-d");
        assert!(!fresh.duplicate);
        assert!(q.take_deliverable_staged("WKS-01").is_empty());

        // The dedup key for the purged payload was released too.
        assert!(!q.submit("WKS-01", 4, "payload-b").duplicate);

        // Other origins are untouched.
        assert_eq!(q.list_pending().iter().filter(|e| e.origin == "WKS-02").count(), 1);
    }

    #[test]
    fn staged_decisions_per_origin_are_capped_oldest_first() {
        let q = queue();
        let total = STAGED_PER_ORIGIN_CAP as u64 + 2;
        for i in 1..=total {
            let s = q.submit("WKS-01", i, &format!("payload-{i}"));
            q.decide(s.server_id, Verdict::Deny).expect("pending");
        }

        let ids: Vec<u64> = (1..=total).collect();
        let taken = q.take_staged("WKS-01", &ids);
        assert_eq!(taken.len(), STAGED_PER_ORIGIN_CAP);
        // The two oldest were discarded.
        assert_eq!(taken[0].agent_message_id, 3);
        assert_eq!(taken.last().map(|d| d.agent_message_id), Some(total));
    }

    #[test]
    fn restage_preserves_delivery_order() {
        let q = queue();
        let a = q.submit("WKS-01", 1, "payload-a");
        let b = q.submit("WKS-01", 2, "payload-b");
        q.decide(a.server_id, Verdict::Allow).expect("a");
        q.decide(b.server_id, Verdict::Deny).expect("b");

        let mut taken = q.take_deliverable_staged("WKS-01");
        assert_eq!(taken.len(), 2);

        // First write succeeded, second failed: put it back.
        let undelivered = taken.split_off(1);
        q.restage("WKS-01", undelivered);

        let again = q.take_deliverable_staged("WKS-01");
        assert_eq!(again, vec![StagedDecision { agent_message_id: 2, response: Verdict::Deny }]);
    }
}
