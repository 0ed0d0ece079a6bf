//! Correlator: assigns local ids and tracks unresolved suspicion events.
//!
//! Owns the pending map and the arrival-order sequence behind one mutex, so
//! an id is resolved at most once and removal is atomic with resolution.
//! Nothing outside this type ever sees the raw structures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::types::SuspicionEvent;

#[derive(Default)]
struct PendingState {
    by_id: HashMap<u64, SuspicionEvent>,
    /// Unresolved local ids in arrival order (front = oldest).
    order: Vec<u64>,
}

pub struct Correlator {
    /// Monotonic local id source, first id is 1. A u64 would take centuries
    /// of continuous detection to wrap; wraparound is treated as unreachable.
    next_id: AtomicU64,
    pending: Mutex<PendingState>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(PendingState::default()),
        }
    }

    /// Assign the next local id to the event and record it as pending.
    pub fn register(&self, event: SuspicionEvent) -> u64 {
        let mut pending = self.pending.lock();
        let local_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        pending.by_id.insert(local_id, event);
        pending.order.push(local_id);
        local_id
    }

    /// Resolve a decision by explicit id. An unknown id (already resolved,
    /// or synthesized away after a link loss) is logged and discarded.
    pub fn resolve(&self, local_id: u64) -> Option<SuspicionEvent> {
        let mut pending = self.pending.lock();
        match pending.by_id.remove(&local_id) {
            Some(event) => {
                pending.order.retain(|&id| id != local_id);
                Some(event)
            }
            None => {
                log::warn!("decision for unknown local id {}, discarding", local_id);
                None
            }
        }
    }

    /// Resolve the oldest pending entry. The stream transport's replies
    /// carry no id; they match pending events in submission order.
    pub fn resolve_oldest(&self) -> Option<(u64, SuspicionEvent)> {
        let mut pending = self.pending.lock();
        if pending.order.is_empty() {
            return None;
        }
        let local_id = pending.order.remove(0);
        let event = pending.by_id.remove(&local_id)?;
        Some((local_id, event))
    }

    /// Transport-loss hook: drain every pending entry in arrival order.
    /// The caller synthesizes a Deny for each one (fail-closed).
    pub fn fail_all_pending(&self) -> Vec<(u64, SuspicionEvent)> {
        let mut pending = self.pending.lock();
        let order = std::mem::take(&mut pending.order);
        let mut by_id = std::mem::take(&mut pending.by_id);
        order
            .into_iter()
            .filter_map(|id| by_id.remove(&id).map(|event| (id, event)))
            .collect()
    }

    /// Oldest-first snapshot of unresolved ids, for poll-transport pickups.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.pending.lock().order.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().order.len()
    }
}
