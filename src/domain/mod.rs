//! Domain types for the gisbatch envelope.
//!
//! This module contains the core data structures:
//! - Clock: time source for timestamps and elapsed time
//! - MessageLog: append-only timestamped entries for one run
//! - Fault / RunOutcome: what a unit of work produced
//! - Run: lifecycle of a single execution

pub mod clock;
pub mod log;
pub mod outcome;
pub mod run;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use log::{LogEntry, MessageLog};
pub use outcome::{Fault, FaultKind, FlushAttempt, FlushStatus, RunOutcome};
pub use run::{Run, RunState, TransitionError};
