//! Adapter interfaces for external collaborators.
//!
//! The geoprocessing toolkit, file-transfer clients and archive tools are
//! never reimplemented here. Each call is one opaque invocation that either
//! succeeds or fails.

pub mod command;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

pub use command::CommandAdapter;

/// A fully expanded call to an external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `program arg1 arg2`, for log messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output from an adapter execution
#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl AdapterOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Last non-empty line of stdout: the tool's result message
    pub fn result_message(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
    }
}

/// Trait for external adapters
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Run one invocation to completion
    async fn execute(&self, invocation: &Invocation) -> Result<AdapterOutput>;

    /// Check that the invocation could be started
    async fn health_check(&self, invocation: &Invocation) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_message_is_last_line() {
        let output = AdapterOutput::new("Start Time: 06:00\nSucceeded at 06:04\n\n");
        assert_eq!(output.result_message(), Some("Succeeded at 06:04"));
        assert_eq!(AdapterOutput::default().result_message(), None);
    }

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("python").arg("compress.py").arg("county.sde");
        assert_eq!(inv.display(), "python compress.py county.sde");
    }
}
