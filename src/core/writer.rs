//! Best-effort log writing.
//!
//! The writer never fails: a destination that cannot be written is recorded
//! in the returned [`FlushStatus`] and otherwise ignored.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::domain::{FlushAttempt, FlushStatus, MessageLog};

/// Shared in-memory buffer that receives flushed logs
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every text flushed into this sink, oldest first
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The most recently flushed text
    pub fn last(&self) -> Option<String> {
        self.writes().pop()
    }

    fn push(&self, text: &str) {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }
}

/// Where a rendered log is written
#[derive(Debug, Clone)]
pub enum LogDestination {
    /// Plain text file, overwritten on each run. The parent directory is
    /// not created.
    File(PathBuf),

    /// Standard output
    Console,

    /// Standard error, for when stdout carries machine-readable output
    Stderr,

    /// One `tracing` event per line
    Tracing,

    /// In-memory buffer
    Memory(MemorySink),
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Console => write!(f, "console"),
            Self::Stderr => write!(f, "stderr"),
            Self::Tracing => write!(f, "tracing"),
            Self::Memory(_) => write!(f, "memory"),
        }
    }
}

impl LogDestination {
    fn write(&self, text: &str) -> std::io::Result<()> {
        match self {
            Self::File(path) => std::fs::write(path, text),
            Self::Console => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()
            }
            Self::Stderr => {
                let mut stderr = std::io::stderr().lock();
                stderr.write_all(text.as_bytes())?;
                stderr.flush()
            }
            Self::Tracing => {
                for line in text.lines() {
                    info!(target: "gisbatch::report", "{}", line);
                }
                Ok(())
            }
            Self::Memory(sink) => {
                sink.push(text);
                Ok(())
            }
        }
    }
}

/// Writes a rendered log to one or more destinations
#[derive(Debug, Clone, Default)]
pub struct LogWriter {
    destinations: Vec<LogDestination>,
}

impl LogWriter {
    pub fn new(destination: LogDestination) -> Self {
        Self {
            destinations: vec![destination],
        }
    }

    /// Add another destination
    pub fn with(mut self, destination: LogDestination) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn destinations(&self) -> &[LogDestination] {
        &self.destinations
    }

    /// Write `text` to every destination, swallowing write failures
    pub fn flush(&self, text: &str) -> FlushStatus {
        let attempts = self
            .destinations
            .iter()
            .map(|destination| {
                let error = match destination.write(text) {
                    Ok(()) => {
                        debug!(%destination, "Log written");
                        None
                    }
                    Err(e) => {
                        warn!(%destination, error = %e, "Failed to write log");
                        Some(e.to_string())
                    }
                };
                FlushAttempt {
                    destination: destination.to_string(),
                    error,
                }
            })
            .collect();

        FlushStatus { attempts }
    }
}

/// Owns the message log for a run and flushes it exactly once.
///
/// Calling [`FlushGuard::finish`] flushes and hands back the rendered text.
/// If the guard is dropped first (early return, panic, cancelled future) the
/// log is flushed from `Drop`.
#[derive(Debug)]
pub struct FlushGuard {
    writer: LogWriter,
    log: MessageLog,
    flushed: bool,
}

impl FlushGuard {
    pub fn new(writer: LogWriter, log: MessageLog) -> Self {
        Self {
            writer,
            log,
            flushed: false,
        }
    }

    pub fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }

    /// Flush now and return the rendered log with the write status
    pub fn finish(mut self) -> (String, FlushStatus) {
        let text = self.log.render();
        let status = self.writer.flush(&text);
        self.flushed = true;
        (text, status)
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if !self.flushed {
            self.flushed = true;
            let _ = self.writer.flush(&self.log.render());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_destination_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.txt");
        std::fs::write(&path, "old contents").unwrap();

        let writer = LogWriter::new(LogDestination::File(path.clone()));
        let status = writer.flush("new contents\n");

        assert!(status.is_complete());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new contents\n");
    }

    #[test]
    fn test_missing_directory_is_swallowed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("report.txt");

        let writer = LogWriter::new(LogDestination::File(path.clone()));
        let status = writer.flush("text");

        assert!(!status.is_complete());
        assert_eq!(status.attempts.len(), 1);
        assert!(status.attempts[0].error.is_some());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_destination_does_not_block_others() {
        let temp = TempDir::new().unwrap();
        let sink = MemorySink::new();
        let writer = LogWriter::new(LogDestination::File(temp.path().join("nope/x.txt")))
            .with(LogDestination::Memory(sink.clone()));

        let status = writer.flush("hello");

        assert_eq!(status.attempts.len(), 2);
        assert!(status.attempts[1].error.is_none());
        assert_eq!(sink.last().as_deref(), Some("hello"));
    }

    #[test]
    fn test_guard_flushes_once_on_finish() {
        let sink = MemorySink::new();
        let mut guard = FlushGuard::new(
            LogWriter::new(LogDestination::Memory(sink.clone())),
            MessageLog::default(),
        );
        guard.log_mut().append("done");

        let (text, status) = guard.finish();

        assert!(status.is_complete());
        assert_eq!(sink.writes(), vec![text]);
    }

    #[test]
    fn test_guard_flushes_on_drop() {
        let sink = MemorySink::new();
        {
            let mut guard = FlushGuard::new(
                LogWriter::new(LogDestination::Memory(sink.clone())),
                MessageLog::default(),
            );
            guard.log_mut().append("interrupted");
        }

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("interrupted"));
    }
}
