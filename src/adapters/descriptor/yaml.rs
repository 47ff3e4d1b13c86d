//! YAML descriptor files.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::descriptor::journal_path_for;
use crate::domain::models::JobDescriptor;
use crate::domain::ports::DescriptorStore;

/// Descriptor store reading and writing YAML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDescriptorStore;

impl YamlDescriptorStore {
    pub const fn new() -> Self {
        Self
    }

    /// Parse descriptor text; `path` becomes the descriptor's identity.
    pub fn parse(path: &Path, text: &str) -> DomainResult<JobDescriptor> {
        let descriptor: JobDescriptor =
            serde_yaml::from_str(text).map_err(|e| DomainError::InvalidDescriptor {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(descriptor.with_path(path))
    }

    pub fn render(descriptor: &JobDescriptor) -> DomainResult<String> {
        serde_yaml::to_string(descriptor).map_err(|e| DomainError::InvalidDescriptor {
            path: descriptor.path().to_path_buf(),
            message: e.to_string(),
        })
    }
}

async fn present(path: &Path) -> DomainResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| DomainError::io(path, e))
}

/// State of a candidate name for a new descriptor.
enum Claim {
    Free,
    Taken,
    /// The same content is already there and nothing has run it yet
    Written,
}

async fn claim(candidate: &JobDescriptor, fresh: &[usize], text: &str) -> DomainResult<Claim> {
    let path = candidate.path();
    let journal = journal_path_for(path);
    if present(path).await? {
        let existing = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DomainError::io(path, e))?;
        if existing == text && !present(&journal).await? {
            return Ok(Claim::Written);
        }
        return Ok(Claim::Taken);
    }
    if present(&journal).await? {
        return Ok(Claim::Taken);
    }
    for &i in fresh {
        if let Some(record) = candidate.data.get(i) {
            if present(&candidate.resolve(&record.filename)).await? {
                return Ok(Claim::Taken);
            }
        }
    }
    Ok(Claim::Free)
}

#[async_trait]
impl DescriptorStore for YamlDescriptorStore {
    async fn load(&self, path: &Path) -> DomainResult<JobDescriptor> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::DescriptorNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(DomainError::io(path, e)),
        };
        Self::parse(path, &text)
    }

    async fn exists(&self, path: &Path) -> DomainResult<bool> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| DomainError::io(path, e))
    }

    async fn create(
        &self,
        descriptor: &JobDescriptor,
        predecessor: &JobDescriptor,
    ) -> DomainResult<PathBuf> {
        let fresh = descriptor.fresh_records(predecessor);
        let mut candidate = descriptor.clone();
        loop {
            let text = Self::render(&candidate)?;
            let path = candidate.path().to_path_buf();
            match claim(&candidate, &fresh, &text).await? {
                Claim::Written => {
                    tracing::debug!(written = %path.display(), "successor already written");
                    return Ok(path);
                }
                Claim::Taken => {
                    candidate.advance_counter(&fresh);
                    continue;
                }
                Claim::Free => {}
            }
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(mut file) => {
                    file.write_all(text.as_bytes())
                        .await
                        .map_err(|e| DomainError::io(&path, e))?;
                    file.flush().await.map_err(|e| DomainError::io(&path, e))?;
                    if path != descriptor.path() {
                        tracing::debug!(
                            requested = %descriptor.path().display(),
                            written = %path.display(),
                            "successor name taken, used next counter"
                        );
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate.advance_counter(&fresh);
                }
                Err(e) => return Err(DomainError::io(&path, e)),
            }
        }
    }

    async fn remove(&self, path: &Path) -> DomainResult<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| DomainError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DataRecord;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_descriptor() {
        let dir = TempDir::new().unwrap();
        let err = YamlDescriptorStore::new()
            .load(&dir.path().join("nope.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DescriptorNotFound(_)));
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "data: [unterminated").unwrap();
        let err = YamlDescriptorStore::new().load(&path).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidDescriptor { .. }));
    }

    #[tokio::test]
    async fn test_create_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = YamlDescriptorStore::new();
        let wanted = dir.path().join("run.count001.yaml");
        std::fs::write(&wanted, "solver: {}\n").unwrap();
        std::fs::write(dir.path().join("run.count002.log"), "").unwrap();

        let mut successor = JobDescriptor::new(&wanted);
        successor.solver.precision = Some(1600);
        let written = store
            .create(&successor, &JobDescriptor::new(dir.path().join("run.yaml")))
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("run.count003.yaml"));
        assert_eq!(std::fs::read_to_string(&wanted).unwrap(), "solver: {}\n");
        let reloaded = store.load(&written).await.unwrap();
        assert_eq!(reloaded.solver.precision, Some(1600));
        assert_eq!(reloaded.path(), written);
    }

    fn bisected(dir: &Path, gap: &str) -> (JobDescriptor, JobDescriptor) {
        let mut before = JobDescriptor::new(dir.join("run.yaml"));
        before.data.push(DataRecord {
            filename: "gap.json".to_string(),
            variables: BTreeMap::from([("gap".to_string(), "0.5".to_string())]),
        });
        let mut next = before.clone().with_path(dir.join("run.count001.yaml"));
        next.data[0].filename = "gap.count001.json".to_string();
        next.data[0]
            .variables
            .insert("gap".to_string(), gap.to_string());
        (before, next)
    }

    #[tokio::test]
    async fn test_create_moves_data_file_past_stale_one() {
        let dir = TempDir::new().unwrap();
        let store = YamlDescriptorStore::new();
        std::fs::write(dir.path().join("gap.count001.json"), "stale").unwrap();

        let (before, next) = bisected(dir.path(), "0.55");
        let written = store.create(&next, &before).await.unwrap();

        assert_eq!(written, dir.path().join("run.count002.yaml"));
        let reloaded = store.load(&written).await.unwrap();
        assert_eq!(reloaded.data[0].filename, "gap.count002.json");
        assert_eq!(reloaded.data[0].variables["gap"], "0.55");
    }

    #[tokio::test]
    async fn test_create_reuses_identical_unstarted_successor() {
        let dir = TempDir::new().unwrap();
        let store = YamlDescriptorStore::new();
        let (before, next) = bisected(dir.path(), "0.55");

        let first = store.create(&next, &before).await.unwrap();
        let again = store.create(&next, &before).await.unwrap();
        assert_eq!(first, again);

        // once the successor has a journal it is never handed out twice
        std::fs::write(journal_path_for(&first), "sub :: status :: submitted\n").unwrap();
        let third = store.create(&next, &before).await.unwrap();
        assert_eq!(third, dir.path().join("run.count002.yaml"));
    }
}
