//! Core envelope and job engine.
//!
//! This module contains:
//! - Envelope: the operation runner (run, time, report, flush)
//! - FailureReporter: fault to log entry
//! - LogWriter: best-effort, exactly-once log flushing
//! - Job / JobExecutor: declarative batch jobs run inside the envelope
//! - TemplateContext: `{date}` and variable expansion for job files

pub mod envelope;
pub mod executor;
pub mod job;
pub mod reporter;
pub mod template;
pub mod writer;

// Re-export commonly used types
pub use envelope::{Envelope, FnWork, RunReport, UnitOfWork, DEFAULT_DATE_FORMAT, SUCCESS_MARKER};
pub use executor::JobExecutor;
pub use job::{CommandSpec, DestinationKind, Job, LogSettings, Step, StepAction};
pub use reporter::FailureReporter;
pub use template::{TemplateContext, TemplateError};
pub use writer::{FlushGuard, LogDestination, LogWriter, MemorySink};
