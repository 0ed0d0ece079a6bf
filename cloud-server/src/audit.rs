//! Append-only decision audit.
//!
//! Every adjudicated event produces exactly one record. Records are kept
//! in memory for the operator API and, when configured with a path,
//! appended as JSON lines so the trail survives a restart.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub agent: String,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLog {
    path: Option<PathBuf>,
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Record one decision. A write failure on the backing file is logged
    /// and does not lose the in-memory record.
    pub fn append(&self, record: AuditRecord) {
        if let Some(path) = &self.path {
            if let Err(err) = append_line(path, &record) {
                tracing::error!("failed to persist audit record {}: {}", record.id, err);
            }
        }
        self.records.lock().push(record);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

fn append_line(path: &PathBuf, record: &AuditRecord) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{line}")
}
