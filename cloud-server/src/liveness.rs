//! Agent liveness tracking.
//!
//! Agents ping periodically over HTTP. An agent is online while its last
//! ping falls inside the configured window; there is no explicit
//! deregistration, expired records are pruned on read.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent: String,
    pub last_seen: DateTime<Utc>,
}

pub struct LivenessTracker {
    window: Duration,
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl LivenessTracker {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: Duration::seconds(window_secs),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn ping(&self, agent: &str) {
        self.record(agent, Utc::now());
    }

    fn record(&self, agent: &str, at: DateTime<Utc>) {
        self.last_seen.lock().insert(agent.to_string(), at);
    }

    pub fn is_online(&self, agent: &str) -> bool {
        let cutoff = Utc::now() - self.window;
        self.last_seen
            .lock()
            .get(agent)
            .is_some_and(|seen| *seen >= cutoff)
    }

    /// The agents currently online, sorted by name. Records that aged out
    /// of the window are dropped here.
    pub fn statuses(&self) -> Vec<AgentStatus> {
        let cutoff = Utc::now() - self.window;
        let mut last_seen = self.last_seen.lock();
        last_seen.retain(|_, seen| *seen >= cutoff);

        let mut statuses: Vec<AgentStatus> = last_seen
            .iter()
            .map(|(agent, seen)| AgentStatus {
                agent: agent.clone(),
                last_seen: *seen,
            })
            .collect();
        statuses.sort_by(|a, b| a.agent.cmp(&b.agent));
        statuses
    }

    pub fn online_count(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut last_seen = self.last_seen.lock();
        last_seen.retain(|_, seen| *seen >= cutoff);
        last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ping_marks_agent_online() {
        let tracker = LivenessTracker::new(30);
        assert!(!tracker.is_online("WKS-01"));

        tracker.ping("WKS-01");
        assert!(tracker.is_online("WKS-01"));
        assert_eq!(tracker.online_count(), 1);
    }

    #[test]
    fn expired_records_are_pruned_on_read() {
        let tracker = LivenessTracker::new(30);
        tracker.record("WKS-01", Utc::now() - Duration::seconds(31));
        tracker.record("WKS-02", Utc::now());

        let statuses = tracker.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].agent, "WKS-02");

        // The expired record is gone, not just hidden.
        assert_eq!(tracker.online_count(), 1);
        assert!(!tracker.is_online("WKS-01"));
    }
}
