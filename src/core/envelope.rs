//! The run-log-report envelope.
//!
//! Executes one unit of work, records how long it took, converts any fault
//! into a log entry, and always flushes the log before returning.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::domain::{Clock, Fault, MessageLog, Run, RunOutcome, SystemClock};

use super::reporter::FailureReporter;
use super::writer::{FlushGuard, LogWriter};

/// Date format used in the success entry when none is configured
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Marker that starts every success entry
pub const SUCCESS_MARKER: &str = "Successfully ran";

/// Location reported when a unit of work panics
const PANIC_LOCATION: &str = "panic";

/// An externally supplied piece of work run inside the envelope
#[async_trait]
pub trait UnitOfWork: Send {
    /// Do the work, appending progress messages to `log`
    async fn execute(&mut self, log: &mut MessageLog) -> Result<(), Fault>;

    /// Release whatever `execute` acquired. Called once after the outcome
    /// entry is logged, whether the work succeeded or not.
    async fn cleanup(&mut self, _log: &mut MessageLog) {}
}

/// Adapts a synchronous closure into a [`UnitOfWork`]
pub struct FnWork<F>(pub F);

#[async_trait]
impl<F> UnitOfWork for FnWork<F>
where
    F: FnMut(&mut MessageLog) -> Result<(), Fault> + Send,
{
    async fn execute(&mut self, log: &mut MessageLog) -> Result<(), Fault> {
        (self.0)(log)
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: Run,

    /// The rendered log, exactly as flushed
    pub log: String,
}

impl RunReport {
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.run.outcome.as_ref()
    }

    /// Process exit code for schedulers: 0 on success, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.run.succeeded() {
            0
        } else {
            1
        }
    }
}

/// Operation runner for a single named job
#[derive(Debug)]
pub struct Envelope {
    job_name: String,
    writer: LogWriter,
    clock: Arc<dyn Clock>,
    date_format: String,
}

impl Envelope {
    pub fn new(job_name: impl Into<String>, writer: LogWriter) -> Self {
        Self {
            job_name: job_name.into(),
            writer,
            clock: Arc::new(SystemClock),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Format for the run date in the success entry
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// Run `work` once and flush the log.
    ///
    /// The log reads: progress messages, the outcome entry, then whatever
    /// [`UnitOfWork::cleanup`] appends. Elapsed time does not include cleanup.
    ///
    /// Never returns an error: faults and panics become a
    /// [`RunOutcome::Failure`], and log write failures are recorded in the
    /// run's flush status.
    #[instrument(skip_all, fields(job = %self.job_name))]
    pub async fn run<W: UnitOfWork>(self, mut work: W) -> RunReport {
        let Envelope {
            job_name,
            writer,
            clock,
            date_format,
        } = self;

        let mut run = Run::new(job_name);
        let mut guard = FlushGuard::new(writer, MessageLog::new(clock.clone()));

        let started_at = clock.now();
        record(run.start(started_at));
        info!(run_id = %run.id, "Starting run");

        let result = CatchPanic::new(work.execute(guard.log_mut())).await;
        let finished_at = clock.now();

        let outcome = match result {
            Ok(Ok(())) => {
                let elapsed = (finished_at - started_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                let date = format_date(&finished_at, &date_format);
                guard.log_mut().append(format!(
                    "{} {} in {:.2} seconds on {}",
                    SUCCESS_MARKER,
                    run.job_name,
                    elapsed.as_secs_f64(),
                    date
                ));
                info!(
                    run_id = %run.id,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Run completed successfully"
                );
                RunOutcome::Success { elapsed }
            }
            Ok(Err(fault)) => {
                FailureReporter::report(guard.log_mut(), &fault);
                fault.into()
            }
            Err(panic_message) => {
                let fault = Fault::generic(panic_message).at(PANIC_LOCATION);
                FailureReporter::report(guard.log_mut(), &fault);
                fault.into()
            }
        };

        record(run.finish(outcome, finished_at));

        if let Err(panic_message) = CatchPanic::new(work.cleanup(guard.log_mut())).await {
            let fault = Fault::generic(panic_message);
            FailureReporter::report_step(guard.log_mut(), "cleanup", &fault);
        }

        let (log, status) = guard.finish();
        record(run.flushed(status));

        RunReport { run, log }
    }
}

/// Lifecycle transitions inside `run` follow a fixed path; a rejected one
/// means a bug here, not in the unit of work.
fn record(result: Result<(), crate::domain::TransitionError>) {
    if let Err(e) = result {
        error!(error = %e, "Run lifecycle violated");
    }
}

fn format_date(at: &chrono::DateTime<chrono::Local>, date_format: &str) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    if write!(out, "{}", at.format(date_format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", at.format(DEFAULT_DATE_FORMAT));
    }
    out
}

/// Polls a boxed future, turning a panic into an error message
struct CatchPanic<'a, T> {
    inner: Pin<Box<dyn Future<Output = T> + Send + 'a>>,
}

impl<'a, T> CatchPanic<'a, T> {
    fn new(inner: Pin<Box<dyn Future<Output = T> + Send + 'a>>) -> Self {
        Self { inner }
    }
}

impl<T> Future for CatchPanic<'_, T> {
    type Output = Result<T, String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Ready(value)) => Poll::Ready(Ok(value)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(panic_message(&*payload))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit of work panicked".to_string()
    }
}
