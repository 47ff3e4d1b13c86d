//! HTCondor-style batch scheduler backend.
//!
//! Submission goes through the scheduler's command-line tools. The job itself
//! runs the `worker` subcommand of this binary on a compute node, where
//! `warmup` and `cooldown` move files between the node and a shared staging
//! directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::tools::{capture, hidden_sibling, run, ToolRunner};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BatchConfig, JobDescriptor, TerminationReason};
use crate::domain::ports::{ExecutionBackend, SubmissionId};

/// Scheduler job states counted as still alive: idle and running.
const ALIVE_STATES: [&str; 2] = ["1", "2"];

/// Batch scheduler backend.
pub struct BatchBackend {
    config: BatchConfig,
    worker_program: String,
    worker_args: Vec<String>,
    tools: ToolRunner,
}

impl BatchBackend {
    pub fn new(
        config: BatchConfig,
        worker_program: String,
        worker_args: Vec<String>,
        tools: ToolRunner,
    ) -> Self {
        Self {
            config,
            worker_program,
            worker_args,
            tools,
        }
    }

    /// Scheduler log of a descriptor's jobs.
    pub fn user_log(descriptor: &JobDescriptor) -> PathBuf {
        hidden_sibling(descriptor.path(), ".condorlog")
    }

    /// Submit description handed to the scheduler on stdin.
    pub fn submit_description(&self, descriptor: &JobDescriptor) -> String {
        let path = descriptor.path();
        let mut arguments = self.worker_args.clone();
        arguments.push("worker".to_string());
        arguments.push(path.to_string_lossy().into_owned());
        arguments.extend(["--backend".to_string(), "batch".to_string()]);

        let mut attributes = BTreeMap::new();
        attributes.insert("executable".to_string(), self.worker_program.clone());
        attributes.insert("arguments".to_string(), quote_arguments(&arguments));
        attributes.insert(
            "log".to_string(),
            Self::user_log(descriptor).to_string_lossy().into_owned(),
        );
        attributes.insert(
            "output".to_string(),
            hidden_sibling(path, ".out").to_string_lossy().into_owned(),
        );
        attributes.insert(
            "error".to_string(),
            hidden_sibling(path, ".err").to_string_lossy().into_owned(),
        );
        attributes.insert(
            "initialdir".to_string(),
            descriptor.directory().to_string_lossy().into_owned(),
        );
        for (key, value) in self.config.attributes.iter().chain(&descriptor.cluster) {
            attributes.insert(custom_attribute(key), value.clone());
        }

        let mut description = String::new();
        for (key, value) in &attributes {
            description.push_str(&format!("{key} = {value}\n"));
        }
        description.push_str("queue\n");
        description
    }

    fn staging_dir(&self, descriptor: &JobDescriptor) -> Option<PathBuf> {
        let staging = descriptor.staging.as_ref()?;
        staging
            .directory
            .clone()
            .or_else(|| self.config.staging_dir.clone())
    }
}

/// The scheduler wants `+Name` for attributes it does not define itself.
fn custom_attribute(key: &str) -> String {
    match key {
        "MaxRuntime" => "+MaxRuntime".to_string(),
        _ => key.to_string(),
    }
}

/// Scheduler argument syntax: the whole list double quoted, each argument
/// single quoted, embedded quotes doubled.
fn quote_arguments(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|a| format!("'{}'", a.replace('\'', "''").replace('"', "\"\"")))
        .collect();
    format!("\"{}\"", quoted.join(" "))
}

/// Cluster id from `condor_submit -terse` output, e.g. `4711.0 - 4711.0`.
pub fn parse_cluster_id(output: &str) -> DomainResult<SubmissionId> {
    let first = output.split_whitespace().next().unwrap_or_default();
    let cluster = first.split('.').next().unwrap_or_default();
    if cluster.is_empty() || !cluster.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::BackendResponse(format!(
            "unexpected submit output: {}",
            output.trim()
        )));
    }
    Ok(SubmissionId::new(cluster))
}

/// Files moved between node and staging directory.
fn staged_files(descriptor: &JobDescriptor) -> Vec<PathBuf> {
    let mut files = descriptor.data_files();
    files.extend(descriptor.out_file());
    files.extend(descriptor.checkpoint_file());
    files.extend(descriptor.backup_checkpoint_file());
    files
}

async fn copy_if_present(from: &Path, to: &Path) -> DomainResult<()> {
    match tokio::fs::copy(from, to).await {
        Ok(_) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "staged file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(from = %from.display(), "nothing to stage");
            Ok(())
        }
        Err(e) => Err(DomainError::io(from, e)),
    }
}

fn in_dir(dir: &Path, file: &Path) -> PathBuf {
    dir.join(file.file_name().unwrap_or(file.as_os_str()))
}

#[async_trait]
impl ExecutionBackend for BatchBackend {
    fn name(&self) -> &'static str {
        "batch"
    }

    async fn submit(&self, descriptor: &JobDescriptor) -> DomainResult<SubmissionId> {
        let description = self.submit_description(descriptor);
        let program = &self.config.submit_command;
        let mut cmd = self.tools.command(program);
        cmd.arg("-terse");
        let output = capture(program, cmd, Some(&description)).await?;
        let id = parse_cluster_id(&output)?;
        tracing::info!(descriptor = %descriptor.path().display(), cluster = %id, "job queued");
        Ok(id)
    }

    async fn is_running(&self, id: &SubmissionId) -> DomainResult<bool> {
        let program = &self.config.query_command;
        let mut cmd = self.tools.command(program);
        cmd.arg(id.as_str()).args(["-af", "JobStatus"]);
        let output = capture(program, cmd, None).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .any(|state| ALIVE_STATES.contains(&state)))
    }

    async fn wait_for_completion(
        &self,
        descriptor: &JobDescriptor,
        id: &SubmissionId,
    ) -> DomainResult<()> {
        let log = Self::user_log(descriptor);
        let program = &self.config.wait_command;
        let mut cmd = self.tools.command(program);
        cmd.arg(&log).arg(id.as_str());
        run(program, cmd).await
    }

    async fn warmup(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        let Some(dir) = self.staging_dir(descriptor) else {
            return Ok(());
        };
        for file in staged_files(descriptor) {
            copy_if_present(&in_dir(&dir, &file), &file).await?;
        }
        Ok(())
    }

    async fn cooldown(
        &self,
        descriptor: &JobDescriptor,
        reason: Option<TerminationReason>,
    ) -> DomainResult<()> {
        let Some(dir) = self.staging_dir(descriptor) else {
            return Ok(());
        };
        let only_on_timeout = descriptor.staging.as_ref().is_some_and(|s| s.only_on_timeout);
        if only_on_timeout && !reason.is_some_and(|r| r.is_budget_timeout()) {
            tracing::debug!(descriptor = %descriptor.path().display(), "no timeout, files stay on node");
            return Ok(());
        }
        for file in staged_files(descriptor) {
            copy_if_present(&file, &in_dir(&dir, &file)).await?;
        }
        Ok(())
    }

    async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        self.tools.create_auxiliary_files(descriptor).await
    }

    async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        self.tools.run_solver(descriptor).await
    }
}
