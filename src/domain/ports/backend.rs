//! Execution backend port - interface for the places jobs run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainResult;
use crate::domain::models::{JobDescriptor, TerminationReason};

/// Opaque handle returned by [`ExecutionBackend::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for execution backends.
///
/// The submission side (`submit`, `is_running`, `wait_for_completion`) is used
/// by the lifecycle driver. The execution side (`warmup`, `create_auxiliary_files`,
/// `run_solver`, `cooldown`) is used by the worker on the node the job runs on.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Hand the job to the backend.
    ///
    /// Fails with [`DomainError::ProcessFailure`](crate::domain::errors::DomainError)
    /// when the backend rejects the job.
    async fn submit(&self, descriptor: &JobDescriptor) -> DomainResult<SubmissionId>;

    /// Whether the backend still knows the submission as queued or running.
    async fn is_running(&self, id: &SubmissionId) -> DomainResult<bool>;

    /// Block until the submission has left the backend.
    async fn wait_for_completion(
        &self,
        descriptor: &JobDescriptor,
        id: &SubmissionId,
    ) -> DomainResult<()>;

    /// Prepare the node before the solver runs.
    async fn warmup(&self, _descriptor: &JobDescriptor) -> DomainResult<()> {
        Ok(())
    }

    /// Tidy up after the solver ran; `reason` is the recorded termination reason.
    async fn cooldown(
        &self,
        _descriptor: &JobDescriptor,
        _reason: Option<TerminationReason>,
    ) -> DomainResult<()> {
        Ok(())
    }

    /// Generate the input data files of the descriptor.
    async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()>;

    /// Run the solver on the descriptor's data files.
    async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()>;
}
