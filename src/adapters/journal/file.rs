//! Journal files on the local filesystem.

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::descriptor::journal_path_for;
use crate::domain::models::{Journal, JournalEntry};
use crate::domain::ports::JournalStore;

/// Journal store writing `<descriptor>.log` files next to each descriptor.
///
/// Every entry is written with a single `write_all` on a file opened in append
/// mode, so concurrent writers (driver and worker) never tear each other's
/// lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileJournalStore;

impl FileJournalStore {
    pub const fn new() -> Self {
        Self
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()
}

#[async_trait]
impl JournalStore for FileJournalStore {
    async fn load(&self, descriptor: &Path) -> DomainResult<Journal> {
        let path = journal_path_for(descriptor);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Journal::parse(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Journal::default()),
            Err(e) => Err(DomainError::io(path, e)),
        }
    }

    async fn append(&self, descriptor: &Path, entry: &JournalEntry) -> DomainResult<()> {
        let path: PathBuf = journal_path_for(descriptor);
        let line = entry.to_line();
        let target = path.clone();
        tokio::task::spawn_blocking(move || append_line(&target, &line))
            .await
            .map_err(|e| DomainError::io(&path, std::io::Error::other(e)))?
            .map_err(|e| DomainError::io(&path, e))?;
        tracing::trace!(journal = %path.display(), key = %entry.key, "journal entry appended");
        Ok(())
    }

    async fn exists(&self, descriptor: &Path) -> DomainResult<bool> {
        let path = journal_path_for(descriptor);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| DomainError::io(path, e))
    }

    async fn remove(&self, descriptor: &Path) -> DomainResult<()> {
        let path = journal_path_for(descriptor);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::journal::{keys, sources};
    use crate::domain::models::JobStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_then_load() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("run.yaml");
        let store = FileJournalStore::new();

        assert!(store.load(&descriptor).await.unwrap().is_empty());
        assert!(!store.exists(&descriptor).await.unwrap());

        store
            .append(&descriptor, &JournalEntry::status(sources::DRIVER, JobStatus::Submitted))
            .await
            .unwrap();
        store
            .append(&descriptor, &JournalEntry::with_value(sources::DRIVER, keys::SUBMISSION_ID, 42))
            .await
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
        assert_eq!(text, "sub :: status :: submitted\nsub :: submissionId :: 42\n");

        let journal = store.load(&descriptor).await.unwrap();
        assert_eq!(journal.status(), Ok(JobStatus::Submitted));
        assert_eq!(journal.submission_id(), Some("42"));
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline_is_read() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("run.yaml");
        std::fs::write(dir.path().join("run.log"), "wrk :: status :: running").unwrap();

        let store = FileJournalStore::new();
        let journal = store.load(&descriptor).await.unwrap();
        assert_eq!(journal.status(), Ok(JobStatus::Running));
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_tear_lines() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("run.yaml");

        let mut handles = Vec::new();
        for i in 0..32 {
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                FileJournalStore::new()
                    .append(&descriptor, &JournalEntry::with_value("wrk", "line", i))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let journal = FileJournalStore::new().load(&descriptor).await.unwrap();
        assert_eq!(journal.len(), 32);
        assert_eq!(journal.skipped_lines(), 0);
    }

    #[tokio::test]
    async fn test_remove_missing_journal_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = FileJournalStore::new();
        store.remove(&dir.path().join("absent.yaml")).await.unwrap();
    }
}
