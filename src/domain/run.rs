//! Run record and its lifecycle.
//!
//! A Run represents a single execution of a job. Every run walks the same
//! path: `NotStarted -> Running -> {Succeeded, Failed} -> Flushed`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::outcome::{FlushStatus, RunOutcome};

/// A single job execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Name of the job being executed
    pub job_name: String,

    /// Current state of the run
    pub state: RunState,

    /// Every state the run has been in, in order
    pub history: Vec<RunState>,

    /// When the unit of work started
    pub started_at: Option<DateTime<Local>>,

    /// When the unit of work returned
    pub finished_at: Option<DateTime<Local>>,

    /// Set once the unit of work has returned
    pub outcome: Option<RunOutcome>,

    /// Set once the log has been flushed
    pub flush: Option<FlushStatus>,
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid run transition from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: RunState,
    pub to: RunState,
}

impl Run {
    /// Create a new run for a job
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            state: RunState::NotStarted,
            history: vec![RunState::NotStarted],
            started_at: None,
            finished_at: None,
            outcome: None,
            flush: None,
        }
    }

    /// Move to `next`, rejecting anything off the lifecycle path
    pub fn advance(&mut self, next: RunState) -> Result<(), TransitionError> {
        if !self.state.can_advance_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the unit of work as started
    pub fn start(&mut self, at: DateTime<Local>) -> Result<(), TransitionError> {
        self.advance(RunState::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// Record the outcome of the unit of work
    pub fn finish(
        &mut self,
        outcome: RunOutcome,
        at: DateTime<Local>,
    ) -> Result<(), TransitionError> {
        let next = if outcome.is_success() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.advance(next)?;
        self.finished_at = Some(at);
        self.outcome = Some(outcome);
        Ok(())
    }

    /// Record that the log has been written out
    pub fn flushed(&mut self, status: FlushStatus) -> Result<(), TransitionError> {
        self.advance(RunState::Flushed)?;
        self.flush = Some(status);
        Ok(())
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().is_some_and(RunOutcome::is_success)
    }

    /// Check if the run has reached its final state
    pub fn is_finished(&self) -> bool {
        self.state == RunState::Flushed
    }
}

/// State of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Flushed,
}

impl RunState {
    fn can_advance_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::NotStarted, RunState::Running)
                | (RunState::Running, RunState::Succeeded)
                | (RunState::Running, RunState::Failed)
                | (RunState::Succeeded, RunState::Flushed)
                | (RunState::Failed, RunState::Flushed)
        )
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::NotStarted
    }
}
