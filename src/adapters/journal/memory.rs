//! In-memory journal store for tests and dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Journal, JournalEntry};
use crate::domain::ports::JournalStore;

/// Journal store keeping entries in memory, keyed by descriptor path.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournalStore {
    journals: Arc<RwLock<HashMap<PathBuf, Vec<JournalEntry>>>>,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered journal text, as it would appear on disk.
    pub async fn text(&self, descriptor: &Path) -> String {
        let journals = self.journals.read().await;
        journals
            .get(descriptor)
            .map(|entries| entries.iter().map(JournalEntry::to_line).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JournalStore for MemoryJournalStore {
    async fn load(&self, descriptor: &Path) -> DomainResult<Journal> {
        let journals = self.journals.read().await;
        Ok(journals
            .get(descriptor)
            .map(|entries| Journal::from_entries(entries.clone()))
            .unwrap_or_default())
    }

    async fn append(&self, descriptor: &Path, entry: &JournalEntry) -> DomainResult<()> {
        let mut journals = self.journals.write().await;
        journals
            .entry(descriptor.to_path_buf())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn exists(&self, descriptor: &Path) -> DomainResult<bool> {
        Ok(self.journals.read().await.contains_key(descriptor))
    }

    async fn remove(&self, descriptor: &Path) -> DomainResult<()> {
        self.journals.write().await.remove(descriptor);
        Ok(())
    }
}
