//! Wiring shared by the commands: configuration, stores and backends.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::backends::BackendRegistry;
use crate::adapters::descriptor::YamlDescriptorStore;
use crate::adapters::journal::FileJournalStore;
use crate::domain::models::Config;
use crate::domain::ports::ExecutionBackend;
use crate::services::AnalyzerPolicy;

/// Everything a command needs besides its own arguments.
pub struct CliContext {
    pub config: Config,
    /// The `--config` file, forwarded to spawned workers
    pub config_path: Option<PathBuf>,
    pub journals: Arc<FileJournalStore>,
    pub descriptors: Arc<YamlDescriptorStore>,
}

impl CliContext {
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
            journals: Arc::new(FileJournalStore::new()),
            descriptors: Arc::new(YamlDescriptorStore::new()),
        }
    }

    fn registry(&self) -> Result<BackendRegistry> {
        let mut args = Vec::new();
        if let Some(path) = &self.config_path {
            let path = std::path::absolute(path)
                .with_context(|| format!("Failed to resolve {}", path.display()))?;
            args.push("--config".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        Ok(BackendRegistry::new(&self.config).with_worker_args(args))
    }

    /// The backend named on the command line, or the configured one.
    pub fn backend(&self, name: Option<&str>) -> Result<Arc<dyn ExecutionBackend>> {
        let registry = self.registry()?;
        match name {
            Some(name) => registry.create(name).with_context(|| {
                format!(
                    "Available backends: {}",
                    BackendRegistry::available_kinds().join(", ")
                )
            }),
            None => Ok(registry.default_backend()),
        }
    }

    pub fn policy(&self) -> Result<AnalyzerPolicy> {
        AnalyzerPolicy::from_config(&self.config.analyzer).context("Invalid analyzer configuration")
    }
}

/// Input files split into existing and missing ones, both in input order.
pub struct Inputs {
    pub found: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl Inputs {
    pub fn partition(files: Vec<PathBuf>) -> Self {
        let (found, missing) = files.into_iter().partition(|f| Path::new(f).is_file());
        Self { found, missing }
    }

    /// Reports missing files on stderr; an error once output is done.
    pub fn finish(&self) -> Result<()> {
        if self.missing.is_empty() {
            return Ok(());
        }
        for path in &self.missing {
            tracing::error!(descriptor = %path.display(), "file not found");
        }
        anyhow::bail!("{} input file(s) not found", self.missing.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        std::fs::write(&b, "solver: {}\n").unwrap();
        std::fs::write(&a, "solver: {}\n").unwrap();

        let inputs = Inputs::partition(vec![
            b.clone(),
            dir.path().join("gone.yaml"),
            a.clone(),
        ]);
        assert_eq!(inputs.found, vec![b, a]);
        assert_eq!(inputs.missing.len(), 1);
        assert!(inputs.finish().is_err());
    }

    #[test]
    fn test_unknown_backend_name() {
        let ctx = CliContext::new(Config::default(), None);
        assert!(ctx.backend(Some("slurm")).is_err());
        assert_eq!(ctx.backend(Some("condor")).unwrap().name(), "batch");
    }
}
