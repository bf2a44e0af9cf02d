//! Subprocess adapter.
//!
//! Runs an external program (a geoprocessing script, an FTP client, an
//! archive tool) and waits for it. There is no timeout: the call returns or
//! the process is killed from outside.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Adapter, AdapterOutput, Invocation};

/// Adapter that spawns external processes
#[derive(Debug, Clone, Default)]
pub struct CommandAdapter {
    /// Directories searched before `PATH` when resolving bare program names
    extra_paths: Vec<PathBuf>,
}

impl CommandAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `dir` for programs before falling back to `PATH`
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_paths.push(dir.into());
        self
    }

    /// Resolve a program name the way the spawn will
    pub fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.resolve_with(program, &executable_extensions())
    }

    /// Resolve `program`, also trying each of `extensions` when the name has
    /// none (`python` -> `python.EXE`)
    fn resolve_with(&self, program: &str, extensions: &[String]) -> Option<PathBuf> {
        let as_path = Path::new(program);
        let names: Vec<String> = if as_path.extension().is_some() {
            vec![program.to_string()]
        } else {
            std::iter::once(program.to_string())
                .chain(extensions.iter().map(|ext| format!("{}{}", program, ext)))
                .collect()
        };

        if as_path.components().count() > 1 || as_path.is_absolute() {
            return names
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.is_file());
        }

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        self.extra_paths
            .iter()
            .cloned()
            .chain(std::env::split_paths(&path_var))
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let program = self
            .resolve(&invocation.program)
            .unwrap_or_else(|| PathBuf::from(&invocation.program));

        let mut cmd = Command::new(program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Extensions Windows tries for a bare program name
#[cfg(windows)]
fn executable_extensions() -> Vec<String> {
    std::env::var("PATHEXT")
        .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(not(windows))]
fn executable_extensions() -> Vec<String> {
    Vec::new()
}

#[async_trait]
impl Adapter for CommandAdapter {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(&self, invocation: &Invocation) -> Result<AdapterOutput> {
        debug!(command = %invocation.display(), "Spawning");

        let output = self
            .command(invocation)
            .output()
            .await
            .with_context(|| format!("Failed to start '{}'", invocation.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            if detail.is_empty() {
                anyhow::bail!("'{}' failed with exit code {}", invocation.program, exit_code);
            }
            anyhow::bail!(
                "'{}' failed with exit code {}: {}",
                invocation.program,
                exit_code,
                detail
            );
        }

        Ok(AdapterOutput { stdout, stderr })
    }

    async fn health_check(&self, invocation: &Invocation) -> Result<()> {
        if self.resolve(&invocation.program).is_none() {
            anyhow::bail!("Program '{}' not found", invocation.program);
        }
        if let Some(dir) = &invocation.working_dir {
            if !dir.is_dir() {
                anyhow::bail!("Working directory '{}' does not exist", dir.display());
            }
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::{Fault, FaultKind};

    #[tokio::test]
    async fn test_captures_stdout() {
        let adapter = CommandAdapter::new();
        let output = adapter
            .execute(&Invocation::new("sh").arg("-c").arg("echo copied 12 rows"))
            .await
            .unwrap();
        assert_eq!(output.result_message(), Some("copied 12 rows"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_generic_fault() {
        let adapter = CommandAdapter::new();
        let err = adapter
            .execute(&Invocation::new("sh").arg("-c").arg("echo lock held >&2; exit 3"))
            .await
            .unwrap_err();

        let fault = Fault::from(err);
        assert_eq!(fault.kind, FaultKind::Generic);
        assert!(fault.description.contains("exit code 3"));
        assert!(fault.description.contains("lock held"));
    }

    #[tokio::test]
    async fn test_silent_failure_has_no_trailing_separator() {
        let adapter = CommandAdapter::new();
        let err = adapter
            .execute(&Invocation::new("sh").arg("-c").arg("exit 2"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "'sh' failed with exit code 2");
    }

    #[test]
    fn test_resolve_tries_executable_extensions() {
        let temp = tempfile::TempDir::new().unwrap();
        let exe = temp.path().join("gisbatch-tool.EXE");
        std::fs::write(&exe, b"").unwrap();

        let adapter = CommandAdapter::new().with_search_path(temp.path());
        let extensions = vec![".COM".to_string(), ".EXE".to_string()];

        assert_eq!(
            adapter.resolve_with("gisbatch-tool", &extensions),
            Some(exe.clone())
        );
        assert_eq!(adapter.resolve_with("gisbatch-tool", &[]), None);
        assert_eq!(adapter.resolve_with("gisbatch-tool.py", &extensions), None);

        let direct = temp.path().join("gisbatch-tool").display().to_string();
        assert_eq!(adapter.resolve_with(&direct, &extensions), Some(exe));
    }

    #[tokio::test]
    async fn test_missing_program_is_environment_fault() {
        let adapter = CommandAdapter::new();
        let err = adapter
            .execute(&Invocation::new("gisbatch-no-such-tool"))
            .await
            .unwrap_err();

        assert_eq!(Fault::from(err).kind, FaultKind::Environment);
    }

    #[tokio::test]
    async fn test_health_check() {
        let adapter = CommandAdapter::new();
        assert!(adapter.health_check(&Invocation::new("sh")).await.is_ok());
        assert!(adapter
            .health_check(&Invocation::new("gisbatch-no-such-tool"))
            .await
            .is_err());
    }
}
