//! Configuration for gisbatch paths and defaults.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (GISBATCH_HOME, GISBATCH_LOG_DIR, GISBATCH_JOBS_DIR)
//! 2. Config file (.gisbatch/config.yaml)
//! 3. Defaults (~/.gisbatch)
//!
//! Config file discovery:
//! - Searches current directory and parents for .gisbatch/config.yaml
//! - Paths in config file are relative to the .gisbatch/ directory

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::DEFAULT_DATE_FORMAT;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const ENV_HOME: &str = "GISBATCH_HOME";
pub const ENV_LOG_DIR: &str = "GISBATCH_LOG_DIR";
pub const ENV_JOBS_DIR: &str = "GISBATCH_JOBS_DIR";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub defaults: Option<DefaultsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
    /// Where run reports are written
    pub logs: Option<String>,
    /// Where job files are looked up
    pub jobs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    pub date_format: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// gisbatch home directory
    pub home: PathBuf,
    /// Directory for run reports
    pub log_dir: PathBuf,
    /// Directory holding job files
    pub jobs_dir: PathBuf,
    /// Default date format for `{date}` and report names
    pub date_format: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".gisbatch").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration starting the file search at `start`, reading
/// overrides through `env`
fn load_config_from<F>(start: &Path, default_home: PathBuf, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_file = find_config_file(start);
    let parsed = config_file.as_deref().map(load_config_file).transpose()?;

    // Paths in the file are relative to .gisbatch/
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let from_file = |pick: fn(&PathsConfig) -> Option<&String>| {
        parsed
            .as_ref()
            .and_then(|c| pick(&c.paths))
            .map(|p| resolve_path(config_dir, p))
    };

    let home = env(ENV_HOME)
        .map(PathBuf::from)
        .or_else(|| from_file(|p| p.home.as_ref()))
        .unwrap_or(default_home);

    let log_dir = env(ENV_LOG_DIR)
        .map(PathBuf::from)
        .or_else(|| from_file(|p| p.logs.as_ref()))
        .unwrap_or_else(|| home.join("logs"));

    let jobs_dir = env(ENV_JOBS_DIR)
        .map(PathBuf::from)
        .or_else(|| from_file(|p| p.jobs.as_ref()))
        .unwrap_or_else(|| home.join("jobs"));

    let date_format = parsed
        .as_ref()
        .and_then(|c| c.defaults.as_ref())
        .and_then(|d| d.date_format.clone())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    Ok(ResolvedConfig {
        home,
        log_dir,
        jobs_dir,
        date_format,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".gisbatch");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    load_config_from(&cwd, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let home = temp.path().join("home");

        let config = load_config_from(temp.path(), home.clone(), no_env).unwrap();

        assert_eq!(config.home, home);
        assert_eq!(config.log_dir, home.join("logs"));
        assert_eq!(config.jobs_dir, home.join("jobs"));
        assert_eq!(config.date_format, DEFAULT_DATE_FORMAT);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_discovered_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".gisbatch");
        std::fs::create_dir_all(&config_dir).unwrap();
        let nested = temp.path().join("scripts").join("nightly");
        std::fs::create_dir_all(&nested).unwrap();

        let mut file = std::fs::File::create(config_dir.join("config.yaml")).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  logs: /var/log/gis
  jobs: jobs
defaults:
  date_format: "%m-%d-%Y"
"#
        )
        .unwrap();

        let config =
            load_config_from(&nested, temp.path().join("unused"), no_env).unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/var/log/gis"));
        assert_eq!(config.jobs_dir, config_dir.join("jobs"));
        assert_eq!(config.date_format, "%m-%d-%Y");
        assert_eq!(config.config_file, Some(config_dir.join("config.yaml")));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".gisbatch");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.yaml"),
            "version: \"1.0\"\npaths:\n  logs: /from/file\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [(ENV_LOG_DIR, "/from/env")].into_iter().collect();
        let config = load_config_from(temp.path(), temp.path().join("h"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/from/env"));
    }

    #[test]
    fn test_minimal_config_file() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".gisbatch");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.yaml"),
            "defaults:\n  date_format: \"%d%m%Y\"\n",
        )
        .unwrap();

        let home = temp.path().join("h");
        let config = load_config_from(temp.path(), home.clone(), no_env).unwrap();

        assert_eq!(config.date_format, "%d%m%Y");
        assert_eq!(config.log_dir, home.join("logs"));
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".gisbatch");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.yaml"), "paths: [not, a, map]\n").unwrap();

        assert!(load_config_from(temp.path(), temp.path().join("h"), no_env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
    }
}
