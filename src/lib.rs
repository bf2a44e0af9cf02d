//! gisbatch - run-log-report envelope for scheduled GIS batch jobs
//!
//! Every job runs inside the same envelope: do the work, time it, turn any
//! fault into a log entry, and always write the report exactly once. Jobs
//! themselves are YAML files whose steps call external tools (geoprocessing
//! scripts, transfer clients, archive tools) through adapters.
//!
//! # Modules
//!
//! - `adapters`: External collaborators (subprocess)
//! - `core`: Envelope, failure reporter, log writer, job engine
//! - `domain`: Data structures (MessageLog, Fault, RunOutcome, Run)
//! - `config`: Config file discovery and report paths
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a job (exit code 0 on success, 1 on failure)
//! gisbatch run geodatabase_maintenance
//!
//! # Check a job file and the programs it calls
//! gisbatch validate jobs/replica_sync.yaml --check-programs
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{Envelope, FnWork, Job, JobExecutor, LogDestination, LogWriter, RunReport, UnitOfWork};
pub use domain::{Fault, FaultKind, LogEntry, MessageLog, Run, RunOutcome, RunState};
