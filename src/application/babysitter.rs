//! Babysitting many descriptors at once.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::services::lifecycle_driver::{DriveReport, LifecycleDriver};

/// Result of driving one input descriptor.
#[derive(Debug)]
pub struct JobResult {
    pub path: PathBuf,
    pub result: DomainResult<DriveReport>,
}

/// Runs the lifecycle driver over many descriptors with bounded concurrency.
pub struct Babysitter {
    driver: Arc<LifecycleDriver>,
    concurrency: usize,
}

impl Babysitter {
    pub fn new(driver: Arc<LifecycleDriver>, concurrency: usize) -> Self {
        Self {
            driver,
            concurrency: concurrency.max(1),
        }
    }

    /// Drive every path once; duplicates are dropped, input order is kept in
    /// the results.
    pub async fn run(&self, paths: Vec<PathBuf>, cancel: CancellationToken) -> Vec<JobResult> {
        let mut seen = HashSet::new();
        let unique: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        info!(jobs = unique.len(), concurrency = self.concurrency, "babysitting");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(unique.len());
        for path in unique {
            let semaphore = semaphore.clone();
            let driver = self.driver.clone();
            let cancel = cancel.clone();
            let task_path = path.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| DomainError::TaskJoin(e.to_string()))?;
                driver.drive(&task_path, &cancel).await
            });
            handles.push((path, handle));
        }

        let (paths, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;
        paths
            .into_iter()
            .zip(joined)
            .map(|(path, joined)| {
                let result = joined.unwrap_or_else(|e| Err(DomainError::TaskJoin(e.to_string())));
                if let Err(err) = &result {
                    warn!(descriptor = %path.display(), error = %err, "driver error");
                }
                JobResult { path, result }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::backends::MockBackend;
    use crate::adapters::descriptor::MemoryDescriptorStore;
    use crate::adapters::journal::MemoryJournalStore;
    use crate::domain::models::JobDescriptor;
    use crate::services::analyzer::AnalyzerPolicy;
    use crate::services::lifecycle_driver::{DriveOutcome, DriverOptions};

    #[tokio::test]
    async fn test_duplicate_paths_are_driven_once() {
        let journals = MemoryJournalStore::new();
        let descriptors = MemoryDescriptorStore::new();
        descriptors.insert(JobDescriptor::new("/j/a.yaml")).await;
        descriptors.insert(JobDescriptor::new("/j/b.yaml")).await;
        let backend = Arc::new(MockBackend::new(Arc::new(journals.clone())));
        let driver = LifecycleDriver::new(
            backend.clone(),
            Arc::new(journals),
            Arc::new(descriptors),
            AnalyzerPolicy::default(),
            DriverOptions::default(),
        );

        let results = Babysitter::new(Arc::new(driver), 2)
            .run(
                vec!["/j/a.yaml".into(), "/j/b.yaml".into(), "/j/a.yaml".into()],
                CancellationToken::new(),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(backend.submissions().await.len(), 2);
        for job in results {
            assert_eq!(
                job.result.unwrap().outcome,
                DriveOutcome::AwaitingCompletion
            );
        }
    }
}
