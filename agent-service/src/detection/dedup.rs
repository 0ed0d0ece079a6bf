//! Dedup cache: one open report per live (pid, path).
//!
//! A key stays cached while the process keeps showing up in scan cycles, so
//! an already-contained process is not re-reported every cycle. As soon as
//! the key is absent from a full cycle's active set the entry is purged,
//! which also handles pid reuse: a new process on a recycled pid is
//! evaluated fresh.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

/// (pid, lower-cased trimmed executable path).
pub type DedupKey = (u32, String);

pub fn dedup_key(pid: u32, exe_path: &str) -> DedupKey {
    (pid, exe_path.trim().to_lowercase())
}

#[derive(Debug, Default)]
pub struct DedupCache {
    reported: HashMap<DedupKey, DateTime<Utc>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reported(&self, key: &DedupKey) -> bool {
        self.reported.contains_key(key)
    }

    pub fn mark_reported(&mut self, key: DedupKey) {
        self.reported.insert(key, Utc::now());
    }

    /// Drop every key that was not observed in this cycle's active set.
    pub fn purge_absent(&mut self, active: &HashSet<DedupKey>) {
        self.reported.retain(|key, _| active.contains(key));
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_process_reports_once_across_cycles() {
        let mut cache = DedupCache::new();
        let key = dedup_key(4321, r"C:\Users\dev\cmd.exe ");

        // Cycle 1: fresh, report and mark.
        assert!(!cache.is_reported(&key));
        cache.mark_reported(key.clone());

        // Cycle 2: still alive, still cached, no second report.
        let active: HashSet<DedupKey> = [key.clone()].into_iter().collect();
        cache.purge_absent(&active);
        assert!(cache.is_reported(&key));
    }

    #[test]
    fn absence_purges_and_pid_reuse_is_fresh() {
        let mut cache = DedupCache::new();
        let key = dedup_key(4321, r"c:\users\dev\cmd.exe");
        cache.mark_reported(key.clone());

        // Process gone: its key is missing from the cycle's active set.
        cache.purge_absent(&HashSet::new());
        assert!(cache.is_empty());

        // Same pid reappears later: treated as a brand new event.
        assert!(!cache.is_reported(&key));
    }

    #[test]
    fn key_normalizes_case_and_whitespace() {
        assert_eq!(
            dedup_key(7, r"  C:\Tools\App.EXE"),
            dedup_key(7, r"c:\tools\app.exe")
        );
        // Different pid, same path: distinct keys.
        assert_ne!(dedup_key(7, r"c:\a.exe"), dedup_key(8, r"c:\a.exe"));
    }
}
