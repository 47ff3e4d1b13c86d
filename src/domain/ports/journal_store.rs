//! Journal store port.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Journal, JournalEntry};

/// Persistence of per-descriptor journals.
///
/// Journals are addressed by the path of the descriptor they belong to.
/// Implementations must make every `append` visible to later `load` calls and
/// must never rewrite existing entries.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Parse the journal of `descriptor`; a missing journal is empty.
    async fn load(&self, descriptor: &Path) -> DomainResult<Journal>;

    /// Append one entry.
    async fn append(&self, descriptor: &Path, entry: &JournalEntry) -> DomainResult<()>;

    /// Whether a journal exists for `descriptor`.
    async fn exists(&self, descriptor: &Path) -> DomainResult<bool>;

    /// Delete the journal of `descriptor`.
    async fn remove(&self, descriptor: &Path) -> DomainResult<()>;
}
