//! Backend that only logs what it would do.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{JobDescriptor, TerminationReason};
use crate::domain::ports::{ExecutionBackend, SubmissionId};

/// Dry-run backend. Submissions always look alive and waits return at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl NoopBackend {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn submit(&self, descriptor: &JobDescriptor) -> DomainResult<SubmissionId> {
        tracing::info!(descriptor = %descriptor.path().display(), "noop: would submit");
        Ok(SubmissionId::new(format!(
            "[noop: {}]",
            descriptor.path().display()
        )))
    }

    async fn is_running(&self, id: &SubmissionId) -> DomainResult<bool> {
        tracing::info!(submission = %id, "noop: would check that the job is still running");
        Ok(true)
    }

    async fn wait_for_completion(
        &self,
        _descriptor: &JobDescriptor,
        id: &SubmissionId,
    ) -> DomainResult<()> {
        tracing::info!(submission = %id, "noop: would wait for completion");
        Ok(())
    }

    async fn warmup(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        tracing::info!(descriptor = %descriptor.path().display(), "noop: warmup");
        Ok(())
    }

    async fn cooldown(
        &self,
        descriptor: &JobDescriptor,
        reason: Option<TerminationReason>,
    ) -> DomainResult<()> {
        tracing::info!(
            descriptor = %descriptor.path().display(),
            reason = ?reason,
            "noop: cooldown"
        );
        Ok(())
    }

    async fn create_auxiliary_files(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        tracing::info!(descriptor = %descriptor.path().display(), "noop: would create data files");
        Ok(())
    }

    async fn run_solver(&self, descriptor: &JobDescriptor) -> DomainResult<()> {
        tracing::info!(
            descriptor = %descriptor.path().display(),
            args = ?descriptor.solver_args(),
            "noop: would run the solver"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_submission_id_names_the_descriptor() {
        let backend = NoopBackend::new();
        let descriptor = JobDescriptor::new("/jobs/run.yaml");
        let id = backend.submit(&descriptor).await.unwrap();
        assert_eq!(id.as_str(), "[noop: /jobs/run.yaml]");
        assert!(backend.is_running(&id).await.unwrap());
    }
}
