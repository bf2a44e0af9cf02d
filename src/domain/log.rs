//! In-memory message log accumulated during a single run.
//!
//! Entries are append-only. The rendered text is what ends up in the
//! report file, one entry per line.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::clock::{Clock, SystemClock};

/// Timestamp format used when rendering entries, e.g. `Jan 17 2024 06:30:00`
pub const ENTRY_TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

/// A single timestamped log message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    timestamp: DateTime<Local>,
    message: String,
}

impl LogEntry {
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render as `<timestamp>  <message>`
    pub fn render(&self) -> String {
        format!(
            "{}  {}",
            self.timestamp.format(ENTRY_TIME_FORMAT),
            self.message
        )
    }
}

/// Ordered, append-only list of log entries for one run
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MessageLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            clock,
        }
    }

    /// Append a message stamped with the current time
    pub fn append(&mut self, text: impl Into<String>) {
        self.entries.push(LogEntry {
            timestamp: self.clock.now(),
            message: text.into(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenate all entries in insertion order
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }
}
