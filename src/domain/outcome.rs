//! Faults raised by units of work and the outcome of a run.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad category of a fault.
///
/// Both kinds are reported identically in the log; the kind is kept so
/// callers can tell a missing file or unreachable host from anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Missing file, unreachable connection, permission denied
    Environment,

    /// Anything else
    Generic,
}

/// A failure raised by a unit of work
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{description}")]
pub struct Fault {
    pub kind: FaultKind,

    /// Where the fault originated (step name, source location), if known
    pub location: Option<String>,

    /// Human-readable description
    pub description: String,
}

impl Fault {
    pub fn environment(description: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Environment,
            location: None,
            description: description.into(),
        }
    }

    pub fn generic(description: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Generic,
            location: None,
            description: description.into(),
        }
    }

    /// Set the location, keeping an existing one if already set
    pub fn at(mut self, location: impl Into<String>) -> Self {
        if self.location.is_none() {
            self.location = Some(location.into());
        }
        self
    }

    /// Tag the fault with the caller's source location
    #[track_caller]
    pub fn here(self) -> Self {
        let caller = std::panic::Location::caller();
        self.at(format!("{}:{}", caller.file(), caller.line()))
    }

    pub fn is_environment(&self) -> bool {
        self.kind == FaultKind::Environment
    }
}

impl From<io::Error> for Fault {
    fn from(err: io::Error) -> Self {
        Fault::environment(err.to_string())
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        if let Some(fault) = err.downcast_ref::<Fault>() {
            return fault.clone();
        }

        let description = format!("{:#}", err);
        let from_environment = err.chain().any(|cause| cause.is::<io::Error>());

        if from_environment {
            Fault::environment(description)
        } else {
            Fault::generic(description)
        }
    }
}

/// Result of a single run. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    Success {
        elapsed: Duration,
    },
    Failure {
        kind: FaultKind,
        location: Option<String>,
        description: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Fault> for RunOutcome {
    fn from(fault: Fault) -> Self {
        Self::Failure {
            kind: fault.kind,
            location: fault.location,
            description: fault.description,
        }
    }
}

/// One destination write attempted while flushing the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushAttempt {
    pub destination: String,

    /// Why the write failed; `None` when it succeeded
    pub error: Option<String>,
}

/// What happened when the log was flushed.
///
/// Kept apart from [`RunOutcome`]: a failed write never changes the outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushStatus {
    pub attempts: Vec<FlushAttempt>,
}

impl FlushStatus {
    /// True when every destination was written
    pub fn is_complete(&self) -> bool {
        self.attempts.iter().all(|a| a.error.is_none())
    }
}
