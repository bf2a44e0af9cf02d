//! Command-line interface for gisbatch.
//!
//! Provides commands for running jobs, validating job files, listing the
//! configured jobs and showing the resolved configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use crate::adapters::{Adapter, CommandAdapter};
use crate::config::{self, paths, ResolvedConfig};
use crate::core::{
    DestinationKind, Envelope, Job, JobExecutor, LogDestination, LogWriter, RunReport, StepAction,
};
use crate::domain::RunOutcome;

/// gisbatch - run scheduled GIS batch jobs and write a report for each run
#[derive(Parser, Debug)]
#[command(name = "gisbatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job and write its report
    ///
    /// Exits 0 when the job succeeds and 1 when it fails; either way a report
    /// is written. Errors found before the job starts (job file not found or
    /// invalid, bad report file name, unreadable config) are printed to
    /// stderr and no report is written.
    Run {
        /// Job name (looks for <jobs_dir>/<name>.yaml) or path to a job file
        job: String,

        /// Write the report here instead of the job's configured file
        #[arg(long, env = "GISBATCH_REPORT")]
        log_file: Option<PathBuf>,

        /// Also print the report to stdout
        #[arg(long)]
        console: bool,

        /// Print the run record as JSON on stdout. Console copies of the
        /// report go to stderr instead.
        #[arg(long)]
        json: bool,
    },

    /// Check a job file without running it
    Validate {
        /// Job name or path to a job file
        job: String,

        /// Also check that every program the job calls can be found
        #[arg(long)]
        check_programs: bool,
    },

    /// List jobs in the jobs directory
    List,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<ExitCode> {
        match self.command {
            Commands::Run {
                job,
                log_file,
                console,
                json,
            } => run_job(&job, log_file, console, json).await,
            Commands::Validate {
                job,
                check_programs,
            } => validate_job(&job, check_programs).await,
            Commands::List => list_jobs(),
            Commands::Config => show_config(),
        }
    }
}

/// Load and validate a job by name or path
fn load_job(config: &ResolvedConfig, name: &str) -> Result<Job> {
    let path = paths::find_job_file(config, name)?;
    let job = Job::from_file(&path)?;
    job.validate()
        .with_context(|| format!("Invalid job file: {}", path.display()))?;
    Ok(job)
}

/// Run a job inside the envelope
async fn run_job(
    name: &str,
    log_file: Option<PathBuf>,
    console: bool,
    json: bool,
) -> Result<ExitCode> {
    let config = config::config()?;
    let job = load_job(config, name)?;

    let run_date = Local::now();
    let date_format = job
        .date_format
        .clone()
        .unwrap_or_else(|| config.date_format.clone());
    let executor = JobExecutor::new(job, CommandAdapter::new(), run_date, &date_format);

    let writer = build_writer(config, &executor, log_file, console, json)?;
    let report = Envelope::new(executor.job().name.clone(), writer)
        .with_date_format(date_format)
        .run(executor)
        .await;

    print_summary(&report, json)?;
    Ok(ExitCode::from(report.exit_code()))
}

fn build_writer(
    config: &ResolvedConfig,
    executor: &JobExecutor<CommandAdapter>,
    log_file: Option<PathBuf>,
    console: bool,
    json: bool,
) -> Result<LogWriter> {
    let job = executor.job();
    // stdout belongs to the JSON record
    let terminal = if json {
        LogDestination::Stderr
    } else {
        LogDestination::Console
    };

    let (primary, primary_is_terminal) = match (log_file, job.log.destination) {
        (Some(path), _) => (LogDestination::File(path), false),
        (None, DestinationKind::File) => (
            LogDestination::File(paths::report_file(config, job, executor.context())?),
            false,
        ),
        (None, DestinationKind::Console) => (terminal.clone(), true),
        (None, DestinationKind::Tracing) => (LogDestination::Tracing, false),
    };

    let mut writer = LogWriter::new(primary);
    if (console || job.log.also_console) && !primary_is_terminal {
        writer = writer.with(terminal);
    }
    Ok(writer)
}

fn print_summary(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        println!("{}", out);
        return Ok(());
    }

    let run = &report.run;
    match report.outcome() {
        Some(RunOutcome::Success { elapsed }) => {
            eprintln!(
                "[Run {} of '{}' completed in {:.2}s]",
                run.id,
                run.job_name,
                elapsed.as_secs_f64()
            );
        }
        Some(RunOutcome::Failure { description, .. }) => {
            eprintln!("[Run {} of '{}' failed: {}]", run.id, run.job_name, description);
        }
        None => {
            eprintln!("[Run {} in state: {:?}]", run.id, run.state);
        }
    }

    if let Some(flush) = &run.flush {
        for attempt in flush.attempts.iter().filter(|a| a.error.is_some()) {
            eprintln!(
                "[Report not written to {}: {}]",
                attempt.destination,
                attempt.error.as_deref().unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Validate a job file, optionally checking its programs exist
async fn validate_job(name: &str, check_programs: bool) -> Result<ExitCode> {
    let config = config::config()?;
    let job = load_job(config, name)?;
    let executor = JobExecutor::new(job, CommandAdapter::new(), Local::now(), &config.date_format);
    let job = executor.job();

    println!("Job: {}", job.name);
    if !job.description.is_empty() {
        println!("Description: {}", job.description);
    }
    if job.log.destination == DestinationKind::File {
        let report = paths::report_file(config, job, executor.context())?;
        println!("Report: {}", report.display());
    }

    let mut problems = 0usize;
    let all_steps = job
        .steps
        .iter()
        .map(|s| (s, ""))
        .chain(job.cleanup.iter().map(|s| (s, " (cleanup)")));
    for (step, suffix) in all_steps {
        println!("  - {}{}", step.name, suffix);

        if let Err(fault) = executor.check_step(step) {
            problems += 1;
            println!("      ! {}", fault.description);
            continue;
        }

        if !check_programs {
            continue;
        }
        if let StepAction::Run(spec) = step.action()? {
            let invocation = executor.invocation(spec)?;
            if let Err(e) = CommandAdapter::new().health_check(&invocation).await {
                problems += 1;
                println!("      ! {}", e);
            }
        }
    }

    if problems > 0 {
        println!("{} problem(s) found", problems);
        return Ok(ExitCode::FAILURE);
    }
    println!("OK");
    Ok(ExitCode::SUCCESS)
}

/// List job files in the jobs directory
fn list_jobs() -> Result<ExitCode> {
    let config = config::config()?;
    let pattern = config.jobs_dir.join("*.y*ml");
    let pattern = pattern
        .to_str()
        .context("Jobs directory is not valid UTF-8")?;

    let mut found = 0usize;
    println!("{:<32} {}", "JOB", "DESCRIPTION");
    println!("{}", "-".repeat(72));

    for entry in glob::glob(pattern).context("Invalid jobs directory pattern")? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        match Job::from_file(&path) {
            Ok(job) => {
                found += 1;
                println!("{:<32} {}", job.name, job.description);
            }
            Err(e) => {
                println!("{:<32} (invalid: {:#})", path.display(), e);
            }
        }
    }

    if found == 0 {
        println!("No jobs found in {}", config.jobs_dir.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the resolved configuration
fn show_config() -> Result<ExitCode> {
    let config = config::config()?;

    println!("Home:        {}", config.home.display());
    println!("Log dir:     {}", config.log_dir.display());
    println!("Jobs dir:    {}", config.jobs_dir.display());
    println!("Date format: {}", config.date_format);
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> ResolvedConfig {
        ResolvedConfig {
            home: PathBuf::from("/srv/gis/.gisbatch"),
            log_dir: PathBuf::from("/srv/gis/results"),
            jobs_dir: PathBuf::from("/srv/gis/jobs"),
            date_format: "%Y-%m-%d".to_string(),
            config_file: None,
        }
    }

    fn executor(log: &str) -> JobExecutor<CommandAdapter> {
        let yaml = format!(
            "name: download_zipped_file\n{}\nsteps:\n  - name: a\n    create_dir: /tmp\n",
            log
        );
        let job = Job::from_yaml(&yaml).unwrap();
        let run_date = Local.with_ymd_and_hms(2020, 6, 1, 3, 0, 0).unwrap();
        JobExecutor::new(job, CommandAdapter::new(), run_date, "%Y-%m-%d")
    }

    fn kinds(writer: &LogWriter) -> Vec<String> {
        writer
            .destinations()
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn test_also_console_goes_to_stdout() {
        let executor = executor("log:\n  also_console: true");
        let writer = build_writer(&config(), &executor, None, false, false).unwrap();
        assert_eq!(
            kinds(&writer),
            vec![
                "file:/srv/gis/results/download_zipped_file_2020-06-01.txt",
                "console"
            ]
        );
    }

    #[test]
    fn test_json_keeps_report_off_stdout() {
        let executor = executor("log:\n  also_console: true");
        let writer = build_writer(&config(), &executor, None, true, true).unwrap();
        let kinds = kinds(&writer);
        assert!(!kinds.contains(&"console".to_string()));
        assert_eq!(kinds[1], "stderr");

        let executor = self::executor("log:\n  destination: console");
        let writer = build_writer(&config(), &executor, None, false, true).unwrap();
        assert_eq!(self::kinds(&writer), vec!["stderr"]);
    }

    #[test]
    fn test_missing_job_is_a_setup_error() {
        let err = load_job(&config(), "gisbatch-no-such-job").unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[test]
    fn test_log_file_flag_wins() {
        let executor = executor("log:\n  destination: console");
        let writer = build_writer(
            &config(),
            &executor,
            Some(PathBuf::from("/tmp/report.txt")),
            true,
            false,
        )
        .unwrap();
        assert_eq!(kinds(&writer), vec!["file:/tmp/report.txt", "console"]);
    }
}
