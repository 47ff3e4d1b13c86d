//! Lifecycle driver.
//!
//! Drives one descriptor from whatever state its journal records to the next
//! stable point: concluded, failed, or waiting on the backend. The driver is
//! re-entrant; every decision is derived from the journal alone, so invoking it
//! again on the same descriptor at any time is safe and never duplicates a
//! submission.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analyzer::{decide, Action, AnalyzerPolicy};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::journal::{keys, sources};
use crate::domain::models::{
    FailureKind, JobDescriptor, JobStatus, Journal, JournalEntry, Outcome,
};
use crate::domain::ports::{DescriptorStore, ExecutionBackend, JournalStore, SubmissionId};

/// Per-invocation switches of the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Block until in-flight jobs complete
    pub wait: bool,
    /// Ask the backend whether in-flight jobs are still alive
    pub really_running: bool,
    /// Resubmit failed jobs (once per descriptor and invocation)
    pub force: bool,
    /// Submission ceiling per descriptor
    pub max_submissions: Option<u32>,
    /// Loop iterations before the driver gives up
    pub max_iterations: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            wait: false,
            really_running: false,
            force: false,
            max_submissions: None,
            max_iterations: 64,
        }
    }
}

/// Where a descriptor chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum DriveOutcome {
    /// The job is with the backend
    AwaitingCompletion,
    /// This invocation concluded the job
    Concluded,
    /// The job was already concluded
    AlreadyConcluded,
    /// The job is failed, with the recorded kind
    Failed(Option<FailureKind>),
    /// Waiting was interrupted; the journal is unchanged
    Cancelled,
}

impl DriveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingCompletion => "awaiting completion",
            Self::Concluded => "concluded",
            Self::AlreadyConcluded => "already concluded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of driving one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveReport {
    /// Descriptor the driver was invoked on
    pub requested: PathBuf,
    /// Descriptor the chain stopped at
    pub descriptor: PathBuf,
    pub outcome: DriveOutcome,
    /// Submissions made by this invocation
    pub submissions: usize,
    /// Successor descriptors written by this invocation
    pub successors: Vec<PathBuf>,
}

enum Step {
    Continue,
    Stop(DriveOutcome),
}

/// Mutable state of one `drive` call.
struct Run {
    current: PathBuf,
    forced: HashSet<PathBuf>,
    just_submitted: Option<PathBuf>,
    waited: Option<PathBuf>,
    submissions: usize,
    successors: Vec<PathBuf>,
}

/// The lifecycle state machine.
pub struct LifecycleDriver {
    backend: Arc<dyn ExecutionBackend>,
    journals: Arc<dyn JournalStore>,
    descriptors: Arc<dyn DescriptorStore>,
    policy: AnalyzerPolicy,
    options: DriverOptions,
}

impl LifecycleDriver {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        journals: Arc<dyn JournalStore>,
        descriptors: Arc<dyn DescriptorStore>,
        policy: AnalyzerPolicy,
        options: DriverOptions,
    ) -> Self {
        Self {
            backend,
            journals,
            descriptors,
            policy,
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Drive `path` and any successors it produces to the next stable point.
    pub async fn drive(&self, path: &Path, cancel: &CancellationToken) -> DomainResult<DriveReport> {
        let mut run = Run {
            current: path.to_path_buf(),
            forced: HashSet::new(),
            just_submitted: None,
            waited: None,
            submissions: 0,
            successors: Vec::new(),
        };

        for iteration in 0..self.options.max_iterations {
            if cancel.is_cancelled() {
                return Ok(report(path, run, DriveOutcome::Cancelled));
            }
            let journal = self.journals.load(&run.current).await?;
            let status = match journal.status() {
                Ok(status) => status,
                Err(unknown) => {
                    warn!(descriptor = %run.current.display(), %unknown, "corrupt journal");
                    self.record_failure(
                        &run.current,
                        sources::DRIVER,
                        FailureKind::CorruptJournal,
                        Some(&unknown.to_string()),
                    )
                    .await?;
                    return Ok(report(
                        path,
                        run,
                        DriveOutcome::Failed(Some(FailureKind::CorruptJournal)),
                    ));
                }
            };
            debug!(descriptor = %run.current.display(), %status, iteration, "driver step");

            let step = match status {
                JobStatus::Unsubmitted | JobStatus::ToSubmit => {
                    self.submit(&mut run, &journal).await?
                }
                JobStatus::Submitted | JobStatus::Running => {
                    self.in_flight(&mut run, &journal, cancel).await?
                }
                JobStatus::Finished => self.finished(&mut run, &journal).await?,
                JobStatus::Concluded => match journal.replaced_with() {
                    Some(next) => self.follow(&mut run, next).await?,
                    None => Step::Stop(DriveOutcome::AlreadyConcluded),
                },
                JobStatus::Failed => {
                    if self.options.force && run.forced.insert(run.current.clone()) {
                        info!(descriptor = %run.current.display(), "forcing resubmission");
                        self.submit(&mut run, &journal).await?
                    } else {
                        Step::Stop(DriveOutcome::Failed(journal.failure_kind()))
                    }
                }
            };

            if let Step::Stop(outcome) = step {
                info!(
                    descriptor = %run.current.display(),
                    outcome = outcome.as_str(),
                    submissions = run.submissions,
                    "driver stopped"
                );
                return Ok(report(path, run, outcome));
            }
        }

        Err(DomainError::IterationLimitExceeded {
            path: run.current,
            limit: self.options.max_iterations,
        })
    }

    async fn append(&self, descriptor: &Path, entry: JournalEntry) -> DomainResult<()> {
        self.journals.append(descriptor, &entry).await
    }

    async fn record_failure(
        &self,
        descriptor: &Path,
        source: &str,
        kind: FailureKind,
        detail: Option<&str>,
    ) -> DomainResult<()> {
        self.append(descriptor, JournalEntry::status(source, JobStatus::Failed))
            .await?;
        self.append(
            descriptor,
            JournalEntry::with_value(source, keys::ERROR_KIND, kind),
        )
        .await?;
        if let Some(detail) = detail {
            self.append(
                descriptor,
                JournalEntry::with_value(source, keys::ERROR, detail),
            )
            .await?;
        }
        Ok(())
    }

    /// Submit the current descriptor, honouring the submission ceiling.
    async fn submit(&self, run: &mut Run, journal: &Journal) -> DomainResult<Step> {
        let current = run.current.clone();
        if let Some(ceiling) = self.options.max_submissions {
            let previous = journal.submission_count();
            if previous >= ceiling as usize {
                warn!(
                    descriptor = %current.display(),
                    submissions = previous,
                    ceiling,
                    "submission ceiling reached"
                );
                self.record_failure(
                    &current,
                    sources::DRIVER,
                    FailureKind::SubmissionCeilingExceeded,
                    None,
                )
                .await?;
                return Ok(Step::Stop(DriveOutcome::Failed(Some(
                    FailureKind::SubmissionCeilingExceeded,
                ))));
            }
        }

        let descriptor = self.descriptors.load(&current).await?;
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
        self.append(
            &current,
            JournalEntry::with_value(sources::DRIVER, keys::SUBMISSION_TIME, now),
        )
        .await?;

        match self.backend.submit(&descriptor).await {
            Ok(id) => {
                self.append(&current, JournalEntry::status(sources::DRIVER, JobStatus::Submitted))
                    .await?;
                self.append(
                    &current,
                    JournalEntry::with_value(sources::DRIVER, keys::SUBMISSION_ID, &id),
                )
                .await?;
                info!(
                    descriptor = %current.display(),
                    backend = self.backend.name(),
                    submission = %id,
                    "submitted"
                );
                run.submissions += 1;
                run.just_submitted = Some(current);
                run.waited = None;
                Ok(Step::Continue)
            }
            Err(err @ DomainError::Io { .. }) => Err(err),
            Err(err) => {
                warn!(descriptor = %current.display(), error = %err, "submission failed");
                let code = match &err {
                    DomainError::ProcessFailure { code: Some(code), .. } => code.to_string(),
                    _ => "none".to_string(),
                };
                self.append(
                    &current,
                    JournalEntry::with_value(sources::DRIVER, keys::SUBMISSION_ERROR, code),
                )
                .await?;
                self.record_failure(
                    &current,
                    sources::DRIVER,
                    FailureKind::ProcessFailure,
                    Some(&err.to_string()),
                )
                .await?;
                Ok(Step::Stop(DriveOutcome::Failed(Some(FailureKind::ProcessFailure))))
            }
        }
    }

    async fn in_flight(
        &self,
        run: &mut Run,
        journal: &Journal,
        cancel: &CancellationToken,
    ) -> DomainResult<Step> {
        let current = run.current.clone();
        let id = journal.submission_id().map(SubmissionId::new);

        if run.waited.as_ref() == Some(&current) {
            warn!(descriptor = %current.display(), "job left the backend without finishing");
            self.record_failure(&current, sources::DRIVER, FailureKind::MissingOutput, None)
                .await?;
            return Ok(Step::Continue);
        }

        let checked = self.options.really_running || self.options.wait;
        let fresh = run.just_submitted.as_ref() == Some(&current);
        if checked && !fresh {
            let alive = match &id {
                Some(id) if self.options.really_running => self.backend.is_running(id).await?,
                Some(_) => true,
                None => false,
            };
            if !alive {
                warn!(descriptor = %current.display(), "submission is gone");
                self.record_failure(&current, sources::DRIVER, FailureKind::LostSubmission, None)
                    .await?;
                return Ok(Step::Continue);
            }
        }

        if !self.options.wait {
            return Ok(Step::Stop(DriveOutcome::AwaitingCompletion));
        }
        let Some(id) = id else {
            self.record_failure(&current, sources::DRIVER, FailureKind::LostSubmission, None)
                .await?;
            return Ok(Step::Continue);
        };

        let descriptor = self.descriptors.load(&current).await?;
        info!(descriptor = %current.display(), submission = %id, "waiting for completion");
        tokio::select! {
            () = cancel.cancelled() => {
                info!(descriptor = %current.display(), "wait cancelled");
                return Ok(Step::Stop(DriveOutcome::Cancelled));
            }
            result = self.backend.wait_for_completion(&descriptor, &id) => result?,
        }
        run.waited = Some(current);
        run.just_submitted = None;
        Ok(Step::Continue)
    }

    async fn finished(&self, run: &mut Run, journal: &Journal) -> DomainResult<Step> {
        let current = run.current.clone();
        let descriptor = self.descriptors.load(&current).await?;
        let outcome = Outcome::from_journal(journal);

        match decide(&descriptor, &outcome, &self.policy) {
            Ok(Action::Resubmit) => {
                info!(
                    descriptor = %current.display(),
                    reason = outcome.termination_reason.as_deref().unwrap_or_default(),
                    "resubmitting unchanged"
                );
                self.submit(run, journal).await
            }
            Ok(action) => match action.successor() {
                Some(next) => self.supersede(run, &descriptor, next, action.label()).await,
                None => {
                    if matches!(action, Action::Bisect(None)) {
                        self.append(&current, JournalEntry::new(sources::ANALYZER, "binary search ended"))
                            .await?;
                    }
                    self.append(&current, JournalEntry::status(sources::ANALYZER, JobStatus::Concluded))
                        .await?;
                    Ok(Step::Stop(DriveOutcome::Concluded))
                }
            },
            Err(err) => {
                let kind = err.failure_kind();
                warn!(descriptor = %current.display(), error = %err, %kind, "analysis failed");
                self.record_failure(&current, sources::ANALYZER, kind, Some(&err.to_string()))
                    .await?;
                if err.is_fatal() {
                    return Err(DomainError::Analysis(err));
                }
                Ok(Step::Stop(DriveOutcome::Failed(Some(kind))))
            }
        }
    }

    /// Persist `next`, mark the current descriptor superseded and move on.
    async fn supersede(
        &self,
        run: &mut Run,
        current: &JobDescriptor,
        next: &JobDescriptor,
        action: &str,
    ) -> DomainResult<Step> {
        let written = self.descriptors.create(next, current).await?;
        self.append(current.path(), JournalEntry::status(sources::ANALYZER, JobStatus::Concluded))
            .await?;
        self.append(
            current.path(),
            JournalEntry::with_value(sources::ANALYZER, keys::REPLACED_WITH, written.display()),
        )
        .await?;
        info!(
            descriptor = %current.path().display(),
            successor = %written.display(),
            action,
            "descriptor superseded"
        );
        run.successors.push(written.clone());
        run.current = written;
        Ok(Step::Continue)
    }

    async fn follow(&self, run: &mut Run, next: &str) -> DomainResult<Step> {
        let next = PathBuf::from(next.trim());
        if !self.descriptors.exists(&next).await? {
            warn!(
                descriptor = %run.current.display(),
                successor = %next.display(),
                "recorded successor does not exist"
            );
            return Ok(Step::Stop(DriveOutcome::AlreadyConcluded));
        }
        debug!(from = %run.current.display(), to = %next.display(), "following successor");
        run.current = next;
        Ok(Step::Continue)
    }
}

fn report(requested: &Path, run: Run, outcome: DriveOutcome) -> DriveReport {
    DriveReport {
        requested: requested.to_path_buf(),
        descriptor: run.current,
        outcome,
        submissions: run.submissions,
        successors: run.successors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::backends::{MockBackend, MockRun};
    use crate::adapters::descriptor::MemoryDescriptorStore;
    use crate::adapters::journal::MemoryJournalStore;

    struct Fixture {
        journals: MemoryJournalStore,
        descriptors: MemoryDescriptorStore,
        backend: Arc<MockBackend>,
    }

    impl Fixture {
        async fn new(path: &str) -> Self {
            let journals = MemoryJournalStore::new();
            let descriptors = MemoryDescriptorStore::new();
            descriptors.insert(JobDescriptor::new(path)).await;
            let backend = Arc::new(MockBackend::new(Arc::new(journals.clone())));
            Self {
                journals,
                descriptors,
                backend,
            }
        }

        fn driver(&self, options: DriverOptions) -> LifecycleDriver {
            LifecycleDriver::new(
                self.backend.clone(),
                Arc::new(self.journals.clone()),
                Arc::new(self.descriptors.clone()),
                AnalyzerPolicy::default(),
                options,
            )
        }

        async fn seed(&self, path: &str, text: &str) {
            for entry in Journal::parse(text).entries() {
                self.journals.append(Path::new(path), entry).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_lost_submission_is_detected() {
        let fx = Fixture::new("/j/run.yaml").await;
        fx.seed("/j/run.yaml", "sub :: status :: submitted\nsub :: submissionId :: 7\n")
            .await;
        fx.backend.set_running(false);

        let report = fx
            .driver(DriverOptions {
                really_running: true,
                ..DriverOptions::default()
            })
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            DriveOutcome::Failed(Some(FailureKind::LostSubmission))
        );
        assert!(fx.backend.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_force_resubmits_lost_job_once() {
        let fx = Fixture::new("/j/run.yaml").await;
        fx.seed("/j/run.yaml", "sub :: status :: submitted\nsub :: submissionId :: 7\n")
            .await;
        fx.backend.set_running(false);

        let report = fx
            .driver(DriverOptions {
                really_running: true,
                force: true,
                ..DriverOptions::default()
            })
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();

        // resubmitted once; the fresh submission is not probed again
        assert_eq!(report.outcome, DriveOutcome::AwaitingCompletion);
        assert_eq!(report.submissions, 1);
    }

    #[tokio::test]
    async fn test_wait_without_output_is_missing_output() {
        let fx = Fixture::new("/j/run.yaml").await;
        fx.backend.script_any(MockRun::Vanished).await;

        let report = fx
            .driver(DriverOptions {
                wait: true,
                ..DriverOptions::default()
            })
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            DriveOutcome::Failed(Some(FailureKind::MissingOutput))
        );
        assert_eq!(fx.backend.waits().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_is_recorded() {
        let fx = Fixture::new("/j/run.yaml").await;
        fx.backend.fail_next_submit(Some(2)).await;

        let report = fx
            .driver(DriverOptions::default())
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            DriveOutcome::Failed(Some(FailureKind::ProcessFailure))
        );
        let text = fx.journals.text(Path::new("/j/run.yaml")).await;
        assert!(text.contains("sub :: submissionError :: 2\nsub :: status :: failed\n"));
        assert!(text.contains("sub :: errorKind :: ProcessFailure\n"));
    }

    #[tokio::test]
    async fn test_corrupt_journal() {
        let fx = Fixture::new("/j/run.yaml").await;
        fx.seed("/j/run.yaml", "wrk :: status :: exploded\n").await;

        let report = fx
            .driver(DriverOptions::default())
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            DriveOutcome::Failed(Some(FailureKind::CorruptJournal))
        );
    }

    #[tokio::test]
    async fn test_iteration_limit_is_fatal() {
        let fx = Fixture::new("/j/run.yaml").await;
        // every wait finishes with a timeout, so the job keeps coming back
        for _ in 0..10 {
            fx.backend.script_any(MockRun::finished("maxRuntime exceeded")).await;
        }
        let err = fx
            .driver(DriverOptions {
                wait: true,
                max_iterations: 5,
                ..DriverOptions::default()
            })
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::IterationLimitExceeded { limit: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_leaves_journal_alone() {
        let fx = Fixture::new("/j/run.yaml").await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = fx
            .driver(DriverOptions::default())
            .drive(Path::new("/j/run.yaml"), &cancel)
            .await
            .unwrap();
        assert_eq!(report.outcome, DriveOutcome::Cancelled);
        assert!(fx.journals.text(Path::new("/j/run.yaml")).await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_search_stops_without_error() {
        let fx = Fixture::new("/j/run.yaml").await;
        let mut descriptor = JobDescriptor::new("/j/run.yaml");
        descriptor.search.maximum_search = Some(serde_yaml::Value::Null);
        fx.descriptors.insert(descriptor).await;
        fx.seed(
            "/j/run.yaml",
            "wrk :: terminateReason :: found dual feasible solution\nwrk :: status :: finished\n",
        )
        .await;

        let report = fx
            .driver(DriverOptions::default())
            .drive(Path::new("/j/run.yaml"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.outcome,
            DriveOutcome::Failed(Some(FailureKind::UnsupportedSearchMode))
        );
    }
}
