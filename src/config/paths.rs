//! Where job files are found and where run reports land.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::{Job, TemplateContext};

use super::ResolvedConfig;

/// Report file name used when a job does not set one
pub const DEFAULT_REPORT_NAME: &str = "{job}_{date}.txt";

/// Candidate locations for a job given on the command line.
///
/// `name` may be a path to a YAML file; otherwise `<jobs_dir>/<name>.yaml`
/// and `./<name>.yaml` are tried in that order.
pub fn job_candidates(config: &ResolvedConfig, name: &str) -> Vec<PathBuf> {
    let direct = Path::new(name);
    if direct.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
        return vec![direct.to_path_buf()];
    }

    vec![
        config.jobs_dir.join(format!("{}.yaml", name)),
        PathBuf::from(format!("{}.yaml", name)),
    ]
}

/// First existing job file for `name`
pub fn find_job_file(config: &ResolvedConfig, name: &str) -> Result<PathBuf> {
    let candidates = job_candidates(config, name);
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let looked = candidates
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::bail!("Job '{}' not found. Looked for:\n{}", name, looked)
}

/// Report file path for a run of `job`.
///
/// The file name is expanded with the run's placeholders; relative results
/// are placed in the configured log directory.
pub fn report_file(config: &ResolvedConfig, job: &Job, context: &TemplateContext) -> Result<PathBuf> {
    let template = job.log.file.as_deref().unwrap_or(DEFAULT_REPORT_NAME);

    let expanded = context
        .expand(template)
        .with_context(|| format!("Invalid report file name '{}'", template))?;

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(config.log_dir.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::collections::BTreeMap;

    fn config() -> ResolvedConfig {
        ResolvedConfig {
            home: PathBuf::from("/srv/gis/.gisbatch"),
            log_dir: PathBuf::from("/srv/gis/results"),
            jobs_dir: PathBuf::from("/srv/gis/jobs"),
            date_format: "%Y-%m-%d".to_string(),
            config_file: None,
        }
    }

    fn job(file: Option<&str>) -> Job {
        let mut job = Job::from_yaml("name: replica_sync\nsteps:\n  - name: a\n    create_dir: /tmp\n")
            .unwrap();
        job.log.file = file.map(str::to_string);
        job
    }

    fn context() -> TemplateContext {
        TemplateContext::new(
            Local.with_ymd_and_hms(2017, 1, 17, 5, 0, 0).unwrap(),
            "%m-%d-%Y",
            BTreeMap::new(),
        )
        .with_job("replica_sync")
    }

    #[test]
    fn test_default_report_name() {
        let path = report_file(&config(), &job(None), &context()).unwrap();
        assert_eq!(path, PathBuf::from("/srv/gis/results/replica_sync_01-17-2017.txt"));
    }

    #[test]
    fn test_absolute_report_path_is_kept() {
        let path = report_file(
            &config(),
            &job(Some("/mnt/reports/Sync Report {date:%H-%M}.txt")),
            &context(),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/mnt/reports/Sync Report 05-00.txt"));
    }

    #[test]
    fn test_escaped_job_placeholder_stays_literal() {
        let path = report_file(&config(), &job(Some("{{job}}_{job}.txt")), &context()).unwrap();
        assert_eq!(path, PathBuf::from("/srv/gis/results/{job}_replica_sync.txt"));
    }

    #[test]
    fn test_job_candidates() {
        let config = config();
        assert_eq!(
            job_candidates(&config, "nightly"),
            vec![
                PathBuf::from("/srv/gis/jobs/nightly.yaml"),
                PathBuf::from("nightly.yaml")
            ]
        );
        assert_eq!(
            job_candidates(&config, "custom/path.yml"),
            vec![PathBuf::from("custom/path.yml")]
        );
    }
}
