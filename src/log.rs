//! Session-lived diagnostic event log
//!
//! Append-only record of connection lifecycle events, surfaced to the UI
//! layer. Distinct from `tracing`: this log is part of the data model and is
//! what the user reads, not operator telemetry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine activity
    Info,
    /// Something went right (identity open, connection established)
    Success,
    /// Degraded but operational
    Warning,
    /// Failure; details in the message
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One timestamped log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Human-readable time of day, captured at append time
    pub timestamp: String,

    /// Entry text
    pub message: String,

    /// Entry severity
    pub severity: Severity,
}

/// Append-only in-memory event log
///
/// Unbounded; acceptable because entries are diagnostic and session-lived.
/// Callers receive cloned snapshots, never aliases of internal storage.
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry with a timestamp captured now
    pub fn append(&self, message: impl Into<String>, severity: Severity) {
        let entry = LogEntry {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            severity,
        };
        self.lock().push(entry);
    }

    /// Append an info-severity entry
    pub fn info(&self, message: impl Into<String>) {
        self.append(message, Severity::Info);
    }

    /// Snapshot of all entries in insertion order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Number of entries whose message contains `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no entries have been appended
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
