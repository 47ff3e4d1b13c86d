//! The compute-node side of a job.
//!
//! The worker runs one descriptor in place: it stages files in, creates missing
//! data files, runs the solver, records the solver's result lines in the
//! journal, stages files out and marks the job finished.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::journal::{keys, sources};
use crate::domain::models::{FailureKind, JobDescriptor, JobStatus, JournalEntry, TerminationReason};
use crate::domain::ports::{DescriptorStore, ExecutionBackend, JournalStore};

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// The solver ran; the recorded terminateReason, if any
    Finished(Option<String>),
    Failed(FailureKind),
}

/// `key = value;` lines of a solver output file.
pub fn parse_solver_output(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim_matches(|c: char| c == '"' || c == ';' || c.is_whitespace());
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// How long a worker waits for its submitter to record the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Runs one job on the node it was scheduled to.
pub struct Worker {
    backend: Arc<dyn ExecutionBackend>,
    journals: Arc<dyn JournalStore>,
    descriptors: Arc<dyn DescriptorStore>,
    submission_wait: Option<SubmissionWait>,
}

impl Worker {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        journals: Arc<dyn JournalStore>,
        descriptors: Arc<dyn DescriptorStore>,
    ) -> Self {
        Self {
            backend,
            journals,
            descriptors,
            submission_wait: None,
        }
    }

    /// Hold off writing to the journal until it shows `status=submitted`.
    ///
    /// A locally spawned worker can start before the driver has appended the
    /// submission; without the wait its entries would land in front of it.
    #[must_use]
    pub fn await_submission(mut self, wait: SubmissionWait) -> Self {
        self.submission_wait = Some(wait);
        self
    }

    async fn wait_for_submission(&self, path: &Path, wait: SubmissionWait) -> DomainResult<()> {
        let deadline = tokio::time::Instant::now() + wait.timeout;
        loop {
            let journal = self.journals.load(path).await?;
            if journal.status() == Ok(JobStatus::Submitted) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    descriptor = %path.display(),
                    timeout_ms = wait.timeout.as_millis(),
                    "submission not recorded, running anyway"
                );
                return Ok(());
            }
            tokio::time::sleep(wait.poll_interval).await;
        }
    }

    async fn log(&self, descriptor: &Path, key: &str, value: impl std::fmt::Display) -> DomainResult<()> {
        self.journals
            .append(descriptor, &JournalEntry::with_value(sources::WORKER, key, value))
            .await
    }

    async fn fail(
        &self,
        descriptor: &JobDescriptor,
        kind: FailureKind,
        detail: &str,
    ) -> DomainResult<WorkerOutcome> {
        let path = descriptor.path();
        warn!(descriptor = %path.display(), %kind, detail, "worker failed");
        self.journals
            .append(path, &JournalEntry::status(sources::WORKER, JobStatus::Failed))
            .await?;
        self.log(path, keys::ERROR_KIND, kind).await?;
        self.log(path, keys::ERROR, detail).await?;
        Ok(WorkerOutcome::Failed(kind))
    }

    pub async fn run(&self, path: &Path) -> DomainResult<WorkerOutcome> {
        let descriptor = self.descriptors.load(path).await?;
        if let Some(wait) = self.submission_wait {
            self.wait_for_submission(path, wait).await?;
        }
        info!(descriptor = %path.display(), backend = self.backend.name(), "worker started");
        self.journals
            .append(path, &JournalEntry::status(sources::WORKER, JobStatus::Running))
            .await?;

        if let Err(err) = self.backend.warmup(&descriptor).await {
            return self
                .fail(&descriptor, FailureKind::ProcessFailure, &err.to_string())
                .await;
        }

        if let Some(outcome) = self.ensure_data_files(&descriptor).await? {
            return Ok(outcome);
        }

        let solver = self.backend.run_solver(&descriptor).await;
        if let Err(err) = solver {
            self.cooldown(&descriptor, None).await;
            return self
                .fail(&descriptor, FailureKind::ProcessFailure, &err.to_string())
                .await;
        }

        let Some(out_file) = descriptor.out_file() else {
            self.cooldown(&descriptor, None).await;
            return self
                .fail(&descriptor, FailureKind::MissingOutput, "no output file configured")
                .await;
        };
        let text = match tokio::fs::read_to_string(&out_file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.cooldown(&descriptor, None).await;
                let err = DomainError::MissingOutput(out_file);
                return self
                    .fail(&descriptor, FailureKind::MissingOutput, &err.to_string())
                    .await;
            }
            Err(e) => return Err(DomainError::io(out_file, e)),
        };

        let mut reason = None;
        for (key, value) in parse_solver_output(&text) {
            if key == keys::TERMINATE_REASON {
                reason = Some(value.clone());
            }
            self.log(path, &key, value).await?;
        }

        self.cooldown(
            &descriptor,
            reason.as_deref().and_then(TerminationReason::from_str),
        )
        .await;
        self.journals
            .append(path, &JournalEntry::status(sources::WORKER, JobStatus::Finished))
            .await?;
        info!(
            descriptor = %path.display(),
            reason = reason.as_deref().unwrap_or("none"),
            "solver finished"
        );
        Ok(WorkerOutcome::Finished(reason))
    }

    /// Create missing data files. Returns an outcome when the job cannot go on.
    async fn ensure_data_files(
        &self,
        descriptor: &JobDescriptor,
    ) -> DomainResult<Option<WorkerOutcome>> {
        let files = descriptor.data_files();
        if files.is_empty() {
            return Ok(None);
        }
        let path = descriptor.path();
        if all_exist(&files).await {
            self.log(path, keys::RESULT, "data file(s) already exist").await?;
            return Ok(None);
        }

        let started = std::time::Instant::now();
        if let Err(err) = self.backend.create_auxiliary_files(descriptor).await {
            return self
                .fail(descriptor, FailureKind::ProcessFailure, &err.to_string())
                .await
                .map(Some);
        }
        info!(
            descriptor = %path.display(),
            elapsed_ms = started.elapsed().as_millis(),
            "data files created"
        );
        if !all_exist(&files).await {
            return self
                .fail(descriptor, FailureKind::ProcessFailure, "data file(s) not created")
                .await
                .map(Some);
        }
        self.log(path, keys::RESULT, "data file(s) created").await?;
        Ok(None)
    }

    /// Staging out is best effort; a failed copy is logged and recorded but
    /// does not change the job's result.
    async fn cooldown(&self, descriptor: &JobDescriptor, reason: Option<TerminationReason>) {
        if let Err(err) = self.backend.cooldown(descriptor, reason).await {
            warn!(descriptor = %descriptor.path().display(), error = %err, "cooldown failed");
            let _ = self
                .log(descriptor.path(), keys::MESSAGE, format!("cooldown failed: {err}"))
                .await;
        }
    }
}

async fn all_exist(files: &[std::path::PathBuf]) -> bool {
    for file in files {
        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            return false;
        }
    }
    true
}
