//! Runs a job's steps as the unit of work inside the envelope.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, info, instrument};

use crate::adapters::{Adapter, Invocation};
use crate::domain::{Fault, MessageLog};

use super::envelope::UnitOfWork;
use super::job::{CommandSpec, Job, Step, StepAction};
use super::reporter::FailureReporter;
use super::template::TemplateContext;

/// Executes a [`Job`] step by step through an [`Adapter`]
pub struct JobExecutor<A> {
    job: Job,
    adapter: A,
    context: TemplateContext,
}

impl<A: Adapter> JobExecutor<A> {
    /// `date_format` is used when the job does not set its own
    pub fn new(job: Job, adapter: A, run_date: DateTime<Local>, date_format: &str) -> Self {
        let format = job.date_format.as_deref().unwrap_or(date_format).to_string();
        let context =
            TemplateContext::new(run_date, format, job.vars.clone()).with_job(job.name.clone());
        Self {
            job,
            adapter,
            context,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    /// Expand a step's command into a concrete invocation
    pub fn invocation(&self, spec: &CommandSpec) -> Result<Invocation, Fault> {
        let expand = |s: &str| {
            self.context
                .expand(s)
                .map_err(|e| Fault::generic(e.to_string()))
        };

        let env = spec
            .env
            .iter()
            .map(|(k, v)| -> Result<(String, String), Fault> { Ok((k.clone(), expand(v)?)) })
            .collect::<Result<_, Fault>>()?;

        Ok(Invocation {
            program: expand(&spec.program)?,
            args: self
                .context
                .expand_all(&spec.args)
                .map_err(|e| Fault::generic(e.to_string()))?,
            working_dir: spec
                .working_dir
                .as_deref()
                .map(expand)
                .transpose()?
                .map(PathBuf::from),
            env,
        })
    }

    /// Expand every template of every step, including cleanup, without
    /// running anything
    pub fn check(&self) -> Result<(), Fault> {
        self.job
            .steps
            .iter()
            .chain(&self.job.cleanup)
            .try_for_each(|step| self.check_step(step))
    }

    /// Expand the templates of one step
    pub fn check_step(&self, step: &Step) -> Result<(), Fault> {
        let action = step
            .action()
            .map_err(|e| Fault::from(e).at(step_location(step)))?;
        match action {
            StepAction::Run(spec) => {
                self.invocation(spec)
                    .map_err(|f| f.at(step_location(step)))?;
            }
            StepAction::CreateDir(template) | StepAction::RequireFile(template) => {
                self.expand_for(step, template)?;
            }
        }
        if let Some(message) = &step.message {
            self.expand_for(step, message)?;
        }
        Ok(())
    }

    #[instrument(skip(self, log), fields(job = %self.job.name))]
    async fn run_steps(&self, log: &mut MessageLog) -> Result<(), Fault> {
        for step in &self.job.steps {
            match self.run_step(step, log).await {
                Ok(()) => {}
                Err(fault) if step.continue_on_error => {
                    FailureReporter::report_step(log, &step.name, &fault);
                }
                Err(fault) => return Err(fault),
            }
        }
        Ok(())
    }

    /// Cleanup never fails the run; problems are only logged
    #[instrument(skip(self, log), fields(job = %self.job.name))]
    async fn run_cleanup(&self, log: &mut MessageLog) {
        for step in &self.job.cleanup {
            if let Err(fault) = self.run_step(step, log).await {
                FailureReporter::report_step(log, &step.name, &fault);
            }
        }
    }

    async fn run_step(&self, step: &Step, log: &mut MessageLog) -> Result<(), Fault> {
        info!(step = %step.name, "Running step");

        let action = step
            .action()
            .map_err(|e| Fault::from(e).at(step_location(step)))?;
        let message = step
            .message
            .as_deref()
            .map(|template| self.expand_for(step, template))
            .transpose()?;

        let default_message = match action {
            StepAction::Run(spec) => {
                let invocation = self
                    .invocation(spec)
                    .map_err(|f| f.at(step_location(step)))?;
                debug!(
                    adapter = self.adapter.name(),
                    command = %invocation.display(),
                    "Calling adapter"
                );
                let output = self
                    .adapter
                    .execute(&invocation)
                    .await
                    .map_err(Fault::from)
                    .map_err(|f| f.at(step_location(step)))?;
                if let Some(result) = output.result_message() {
                    log.append(format!("completed {}", result));
                }
                format!("Completed step {}", step.name)
            }
            StepAction::CreateDir(template) => {
                let dir = self.expand_for(step, template)?;
                tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                    Fault::environment(format!("Failed to create directory {}: {}", dir, e))
                        .at(step_location(step))
                })?;
                format!("Created directory {}", dir)
            }
            StepAction::RequireFile(template) => {
                let path = self.expand_for(step, template)?;
                if tokio::fs::metadata(&path).await.is_err() {
                    return Err(
                        Fault::environment(format!("The file: {}, was not found", path))
                            .at(step_location(step)),
                    );
                }
                format!("Found {}", path)
            }
        };

        log.append(message.unwrap_or(default_message));
        Ok(())
    }

    fn expand_for(&self, step: &Step, template: &str) -> Result<String, Fault> {
        self.context
            .expand(template)
            .map_err(|e| Fault::generic(e.to_string()).at(step_location(step)))
    }
}

fn step_location(step: &Step) -> String {
    format!("step '{}'", step.name)
}

#[async_trait]
impl<A: Adapter> UnitOfWork for JobExecutor<A> {
    async fn execute(&mut self, log: &mut MessageLog) -> Result<(), Fault> {
        self.run_steps(log).await
    }

    async fn cleanup(&mut self, log: &mut MessageLog) {
        self.run_cleanup(log).await;
    }
}
