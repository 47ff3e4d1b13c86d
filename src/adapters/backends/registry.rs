//! Backend registry and factory.

use std::sync::Arc;
use std::time::Duration;

use super::batch::BatchBackend;
use super::local::{LocalBackend, LocalBackendConfig};
use super::noop::NoopBackend;
use super::tools::ToolRunner;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BackendConfig, BackendKind, Config};
use crate::domain::ports::ExecutionBackend;

/// Builds execution backends from configuration.
pub struct BackendRegistry {
    config: BackendConfig,
    worker: LocalBackendConfig,
}

impl BackendRegistry {
    pub fn new(config: &Config) -> Self {
        let mut worker = LocalBackendConfig {
            poll_interval: Duration::from_millis(config.driver.poll_interval_ms),
            ..LocalBackendConfig::default()
        };
        if let Some(program) = &config.backend.executables.worker {
            worker.worker_program.clone_from(program);
        }
        Self {
            config: config.backend.clone(),
            worker,
        }
    }

    /// Global arguments every spawned worker receives, e.g. `--config FILE`.
    #[must_use]
    pub fn with_worker_args(mut self, args: Vec<String>) -> Self {
        self.worker.worker_args = args;
        self
    }

    fn tools(&self) -> ToolRunner {
        ToolRunner::new(
            self.config.executables.clone(),
            self.config.library_path.clone(),
        )
    }

    /// Create a backend by kind.
    pub fn create_by_kind(&self, kind: BackendKind) -> Arc<dyn ExecutionBackend> {
        match kind {
            BackendKind::Local => Arc::new(LocalBackend::new(self.worker.clone(), self.tools())),
            BackendKind::Batch => Arc::new(BatchBackend::new(
                self.config.batch.clone(),
                self.worker.worker_program.clone(),
                self.worker.worker_args.clone(),
                self.tools(),
            )),
            BackendKind::Noop => Arc::new(NoopBackend::new()),
        }
    }

    /// The configured backend.
    pub fn default_backend(&self) -> Arc<dyn ExecutionBackend> {
        self.create_by_kind(self.config.kind)
    }

    /// Create a backend by name.
    pub fn create(&self, name: &str) -> DomainResult<Arc<dyn ExecutionBackend>> {
        BackendKind::from_str(name)
            .map(|kind| self.create_by_kind(kind))
            .ok_or_else(|| DomainError::UnknownBackend(name.to_string()))
    }

    pub fn available_kinds() -> Vec<&'static str> {
        vec![
            BackendKind::Local.as_str(),
            BackendKind::Batch.as_str(),
            BackendKind::Noop.as_str(),
        ]
    }
}
