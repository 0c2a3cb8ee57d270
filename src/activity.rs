//! In-memory activity log
//!
//! A capped, newest-first buffer of structured entries describing what the
//! relay did with each webhook. It backs the `/logs` endpoint and is lost on
//! restart.
//!
//! Every entry is mirrored to `tracing` at the matching level, so the
//! process log and the audit buffer never disagree.
//!
//! # Example
//!
//! ```rust
//! use payment_alerts::activity::{ActivityLog, LogLevel};
//! use serde_json::json;
//!
//! let log = ActivityLog::new();
//! log.info("Webhook received", Some(json!({ "type": "payment_intent.payment_failed" })));
//! log.record(LogLevel::Warn, "Customer lookup failed", None);
//!
//! let recent = log.recent(50);
//! assert_eq!(recent[0].message, "Customer lookup failed");
//! assert_eq!(log.len(), 2);
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of entries retained
pub const DEFAULT_CAPACITY: usize = 100;

/// Number of entries served by the `/logs` endpoint
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Severity of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Normal progress
    Info,
    /// Degraded outcome
    Warn,
    /// Failed step
    Error,
}

impl LogLevel {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// A single activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Human-readable description
    pub message: String,
    /// Structured context, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Bounded, thread-safe activity log.
///
/// Entries are kept newest-first. Inserting past capacity drops the oldest
/// entry. Append and truncate happen under one lock, so concurrent writers
/// can interleave but never corrupt the buffer.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl ActivityLog {
    /// Create a log holding at most [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log with a custom capacity (at least one entry).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Record an entry stamped with the current time.
    pub fn record(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
        };

        emit(&entry);

        let mut entries = self.entries.lock();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Record an informational entry.
    pub fn info(&self, message: impl Into<String>, data: Option<Value>) {
        self.record(LogLevel::Info, message, data);
    }

    /// Record a warning entry.
    pub fn warn(&self, message: impl Into<String>, data: Option<Value>) {
        self.record(LogLevel::Warn, message, data);
    }

    /// Record an error entry.
    pub fn error(&self, message: impl Into<String>, data: Option<Value>) {
        self.record(LogLevel::Error, message, data);
    }

    /// Snapshot of up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.lock().iter().take(limit).cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Count retained entries at the given level.
    #[cfg(test)]
    pub(crate) fn count_level(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(entry: &LogEntry) {
    let data = entry
        .data
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();

    match entry.level {
        LogLevel::Info => tracing::info!(data = %data, "{}", entry.message),
        LogLevel::Warn => tracing::warn!(data = %data, "{}", entry.message),
        LogLevel::Error => tracing::error!(data = %data, "{}", entry.message),
    }
}
