//! Turns faults into log entries.

use tracing::{error, warn};

use crate::domain::{Fault, MessageLog};

/// Placeholder used when a fault carries no description
const UNKNOWN_ERROR: &str = "unknown error";

/// Writes fault diagnostics into the message log
pub struct FailureReporter;

impl FailureReporter {
    /// Text of the entry for a run-ending fault
    pub fn describe(fault: &Fault) -> String {
        let description = Self::description(fault);
        match fault.location.as_deref() {
            Some(location) => format!("Failed at {}: Error: {}", location, description),
            None => format!("Failed: Error: {}", description),
        }
    }

    /// Append one entry for a fault that ended the run
    pub fn report(log: &mut MessageLog, fault: &Fault) {
        error!(
            kind = ?fault.kind,
            location = fault.location.as_deref().unwrap_or("-"),
            error = %fault,
            "Run failed"
        );
        log.append(Self::describe(fault));
    }

    /// Append one entry for a step that failed without ending the run
    pub fn report_step(log: &mut MessageLog, step: &str, fault: &Fault) {
        warn!(step, kind = ?fault.kind, error = %fault, "Step failed, continuing");
        log.append(format!(
            "Error running {}: {}",
            step,
            Self::description(fault)
        ));
    }

    fn description(fault: &Fault) -> &str {
        let trimmed = fault.description.trim();
        if trimmed.is_empty() {
            UNKNOWN_ERROR
        } else {
            trimmed
        }
    }
}
