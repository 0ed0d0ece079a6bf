//! Core event and decision types shared across the agent pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A process that met the containment-trigger rules, awaiting adjudication.
///
/// Immutable once emitted by the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionEvent {
    pub process_name: String,
    pub exe_path: String,
    pub pid: u32,
    pub source_ip: String,
    pub hostname: String,
    pub detected_at: DateTime<Utc>,
}

/// Operator (or synthesized) outcome for a suspicion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Release: resume the contained process.
    Allow,
    /// Terminate the contained process.
    Deny,
}

impl Verdict {
    /// Parse the wire form. Replies are exactly `"y"` or `"n"`, any case,
    /// surrounding whitespace tolerated.
    pub fn from_wire(s: &str) -> Option<Verdict> {
        match s.trim().to_lowercase().as_str() {
            "y" => Some(Verdict::Allow),
            "n" => Some(Verdict::Deny),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Verdict::Allow => "y",
            Verdict::Deny => "n",
        }
    }
}

/// A verdict matched back to its originating event, ready for the executor.
///
/// Produced exactly once per local id: the correlator removes the pending
/// entry atomically with resolution.
#[derive(Debug, Clone)]
pub struct ResolvedDecision {
    pub local_id: u64,
    pub verdict: Verdict,
    pub event: SuspicionEvent,
}
