//! Mock backend for testing.
//!
//! Records every call and, when waited on, plays a scripted solver run into
//! the job's journal the way a worker would.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::journal::{keys, sources};
use crate::domain::models::{JobDescriptor, JobStatus, JournalEntry};
use crate::domain::ports::{ExecutionBackend, JournalStore, SubmissionId};

/// A scripted solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRun {
    /// The worker records this termination reason (plus extra values) and finishes
    Finished {
        reason: String,
        values: Vec<(String, String)>,
    },
    /// The job disappears without writing to its journal
    Vanished,
}

impl MockRun {
    pub fn finished(reason: impl Into<String>) -> Self {
        Self::Finished {
            reason: reason.into(),
            values: Vec::new(),
        }
    }
}

/// Mock backend for testing.
pub struct MockBackend {
    journal: Arc<dyn JournalStore>,
    runs: Arc<RwLock<HashMap<PathBuf, VecDeque<MockRun>>>>,
    default_runs: Arc<RwLock<VecDeque<MockRun>>>,
    submit_failures: Arc<RwLock<VecDeque<Option<i32>>>>,
    submissions: Arc<RwLock<Vec<PathBuf>>>,
    waits: Arc<RwLock<Vec<PathBuf>>>,
    solver_calls: Arc<RwLock<Vec<PathBuf>>>,
    solver_output: Arc<RwLock<Option<String>>>,
    solver_failure: Arc<RwLock<Option<i32>>>,
    running: AtomicBool,
}

impl MockBackend {
    pub fn new(journal: Arc<dyn JournalStore>) -> Self {
        Self {
            journal,
            runs: Arc::new(RwLock::new(HashMap::new())),
            default_runs: Arc::new(RwLock::new(VecDeque::new())),
            submit_failures: Arc::new(RwLock::new(VecDeque::new())),
            submissions: Arc::new(RwLock::new(Vec::new())),
            waits: Arc::new(RwLock::new(Vec::new())),
            solver_calls: Arc::new(RwLock::new(Vec::new())),
            solver_output: Arc::new(RwLock::new(None)),
            solver_failure: Arc::new(RwLock::new(None)),
            running: AtomicBool::new(true),
        }
    }

    /// Script the next run of a specific descriptor.
    pub async fn script(&self, descriptor: impl AsRef<Path>, run: MockRun) {
        let mut runs = self.runs.write().await;
        runs.entry(descriptor.as_ref().to_path_buf())
            .or_default()
            .push_back(run);
    }

    /// Script the next run of whichever descriptor is waited on next.
    pub async fn script_any(&self, run: MockRun) {
        self.default_runs.write().await.push_back(run);
    }

    /// Make the next submission fail with `code`.
    pub async fn fail_next_submit(&self, code: Option<i32>) {
        self.submit_failures.write().await.push_back(code);
    }

    /// Answer of `is_running` for every submission.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Text `run_solver` writes to the descriptor's output file.
    pub async fn set_solver_output(&self, output: impl Into<String>) {
        *self.solver_output.write().await = Some(output.into());
    }

    pub async fn fail_solver(&self, code: i32) {
        *self.solver_failure.write().await = Some(code);
    }

    /// Descriptors handed to `submit`, in order.
    pub async fn submissions(&self) -> Vec<PathBuf> {
        self.submissions.read().await.clone()
    }

    /// Descriptors waited on, in order.
    pub async fn waits(&self) -> Vec<PathBuf> {
        self.waits.read().await.clone()
    }

    pub async fn solver_calls(&self) -> Vec<PathBuf> {
        self.solver_calls.read().await.clone()
    }

    async fn next_run(&self, descriptor: &Path) -> Option<MockRun> {
        let specific = self
            .runs
            .write()
            .await
            .get_mut(descriptor)
            .and_then(VecDeque::pop_front);
        match specific {
            Some(run) => Some(run),
            None => self.default_runs.write().await.pop_front(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn submit(&self, descriptor: &JobDescriptor) -> DomainResult<SubmissionId> {
        if let Some(code) = self.submit_failures.write().await.pop_front() {
            return Err(DomainError::ProcessFailure {
                command: "mock-submit".to_string(),
                code,
            });
        }
        let mut submissions = self.submissions.write().await;
        submissions.push(descriptor.path().to_path_buf());
        Ok(SubmissionId::new(format!("mock-{}", submissions.len())))
    }

    async fn is_running(&self, _id: &SubmissionId) -> DomainResult<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn wait_for_completion(
        &self,
        descriptor: &JobDescriptor,
        _id: &SubmissionId,
    ) -> DomainResult<()> {
        let path = descriptor.path();
        self.waits.write().await.push(path.to_path_buf());
        let Some(MockRun::Finished { reason, values }) = self.next_run(path).await else {
            return Ok(());
        };
        let mut entries = vec![
            JournalEntry::status(sources::WORKER, JobStatus::Running),
            JournalEntry::with_value(sources::WORKER, keys::TERMINATE_REASON, reason),
        ];
        entries.extend(
            values
                .into_iter()
                .map(|(k, v)| JournalEntry::with_value(sources::WORKER, k, v)),
        );
        entries.push(JournalEntry::status(sources::WORKER, JobStatus::Finished));
        for entry in &entries {
            self.journal.append(path, entry).await?;
        }
        Ok(())
    }

    async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        for file in descriptor.data_files() {
            tokio::fs::write(&file, "")
                .await
                .map_err(|e| DomainError::io(&file, e))?;
        }
        Ok(())
    }

    async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        self.solver_calls
            .write()
            .await
            .push(descriptor.path().to_path_buf());
        if let Some(code) = *self.solver_failure.read().await {
            return Err(DomainError::ProcessFailure {
                command: "mock-solver".to_string(),
                code: Some(code),
            });
        }
        if let (Some(text), Some(out)) = (self.solver_output.read().await.clone(), descriptor.out_file()) {
            tokio::fs::write(&out, text)
                .await
                .map_err(|e| DomainError::io(&out, e))?;
        }
        Ok(())
    }
}
