//! Placeholder expansion for paths and arguments in job files.
//!
//! Supported placeholders:
//! - `{date}`: run date in the job's date format
//! - `{date:%m%d%Y}`: run date in an explicit chrono format
//! - `{job}`: the job name, inserted verbatim
//! - `{name}`: value of the job variable `name` (which may itself use
//!   `{date...}`, but not other variables)
//! - `{{` and `}}`: literal braces

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Local};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed '{{' in template: {0}")]
    Unclosed(String),

    #[error("unmatched '}}' in template: {0}")]
    UnmatchedClose(String),

    #[error("unknown placeholder '{{{0}}}'")]
    Unknown(String),

    #[error("invalid date format '{0}'")]
    BadDateFormat(String),
}

/// Values available to placeholders for one run
#[derive(Debug, Clone)]
pub struct TemplateContext {
    run_date: DateTime<Local>,
    date_format: String,
    vars: BTreeMap<String, String>,
    job: Option<String>,
}

impl TemplateContext {
    pub fn new(
        run_date: DateTime<Local>,
        date_format: impl Into<String>,
        vars: BTreeMap<String, String>,
    ) -> Self {
        Self {
            run_date,
            date_format: date_format.into(),
            vars,
            job: None,
        }
    }

    /// Make `{job}` expand to `name`
    pub fn with_job(mut self, name: impl Into<String>) -> Self {
        self.job = Some(name.into());
        self
    }

    /// Expand every placeholder in `template`
    pub fn expand(&self, template: &str) -> Result<String, TemplateError> {
        self.expand_inner(template, true)
    }

    /// Expand each string in order, stopping at the first error
    pub fn expand_all(&self, templates: &[String]) -> Result<Vec<String>, TemplateError> {
        templates.iter().map(|t| self.expand(t)).collect()
    }

    fn expand_inner(&self, template: &str, allow_vars: bool) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedClose(template.to_string())),
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for k in chars.by_ref() {
                        if k == '}' {
                            closed = true;
                            break;
                        }
                        key.push(k);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(template.to_string()));
                    }
                    out.push_str(&self.resolve(&key, allow_vars)?);
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }

    fn resolve(&self, key: &str, allow_vars: bool) -> Result<String, TemplateError> {
        if key == "date" {
            return self.format_date(&self.date_format);
        }
        if let Some(format) = key.strip_prefix("date:") {
            return self.format_date(format);
        }
        if key == "job" {
            if let Some(job) = &self.job {
                return Ok(job.clone());
            }
        }
        match self.vars.get(key) {
            Some(value) if allow_vars => self.expand_inner(value, false),
            _ => Err(TemplateError::Unknown(key.to_string())),
        }
    }

    fn format_date(&self, format: &str) -> Result<String, TemplateError> {
        let mut out = String::new();
        write!(out, "{}", self.run_date.format(format))
            .map_err(|_| TemplateError::BadDateFormat(format.to_string()))?;
        Ok(out)
    }
}
