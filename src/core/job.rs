//! Job definitions and loading.
//!
//! A job is one scheduled batch task described in YAML: where its report
//! goes, a few variables, the ordered steps, and cleanup steps that run on
//! every exit path.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A complete job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job name (used in CLI and report file names)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Where the run report is written
    #[serde(default)]
    pub log: LogSettings,

    /// Date format for `{date}` and the success entry (overrides config)
    pub date_format: Option<String>,

    /// Variables available to placeholders
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Ordered list of steps to execute
    pub steps: Vec<Step>,

    /// Steps run after `steps` on success and on failure
    #[serde(default)]
    pub cleanup: Vec<Step>,
}

impl Job {
    /// Load a job from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Invalid job file: {}", path.display()))
    }

    /// Parse a job from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse job YAML")
    }

    /// Validate the job definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Job name cannot be empty");
        }

        if self.steps.is_empty() {
            anyhow::bail!("Job must have at least one step");
        }

        let mut seen = HashSet::new();
        for (i, step) in self.steps.iter().chain(self.cleanup.iter()).enumerate() {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step {} has an empty name", i);
            }
            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Duplicate step name '{}'", step.name);
            }
            step.action()?;
        }

        Ok(())
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps
            .iter()
            .chain(self.cleanup.iter())
            .find(|s| s.name == name)
    }
}

/// Report destination settings for a job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub destination: DestinationKind,

    /// Report file name or path; relative paths land in the configured log
    /// directory. Defaults to `<job name>_{date}.txt`.
    pub file: Option<String>,

    /// Also print the report to stdout
    #[serde(default)]
    pub also_console: bool,
}

/// Supported report destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    #[default]
    File,
    Console,
    Tracing,
}

/// A single step in a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name (unique within the job)
    pub name: String,

    /// Run an external program
    pub run: Option<CommandSpec>,

    /// Create a directory (and any missing parents)
    pub create_dir: Option<String>,

    /// Fail with an environment fault if the path does not exist
    pub require_file: Option<String>,

    /// Logged when the step succeeds
    pub message: Option<String>,

    /// Log the failure and carry on with the next step
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Step {
    /// The single action this step performs
    pub fn action(&self) -> Result<StepAction<'_>> {
        let actions = [
            self.run.as_ref().map(StepAction::Run),
            self.create_dir.as_deref().map(StepAction::CreateDir),
            self.require_file.as_deref().map(StepAction::RequireFile),
        ];
        let mut present = actions.into_iter().flatten();

        match (present.next(), present.next()) {
            (Some(action), None) => Ok(action),
            (None, _) => anyhow::bail!("Step '{}' has no action", self.name),
            (Some(_), Some(_)) => {
                anyhow::bail!("Step '{}' has more than one action", self.name)
            }
        }
    }
}

/// What a step does
#[derive(Debug, Clone, Copy)]
pub enum StepAction<'a> {
    Run(&'a CommandSpec),
    CreateDir(&'a str),
    RequireFile(&'a str),
}

/// External program invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the program
    pub working_dir: Option<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
