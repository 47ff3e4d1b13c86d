//! Descriptor store port.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::errors::DomainResult;
use crate::domain::models::JobDescriptor;

/// Persistence of job descriptors.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Read the descriptor at `path`.
    async fn load(&self, path: &Path) -> DomainResult<JobDescriptor>;

    async fn exists(&self, path: &Path) -> DomainResult<bool>;

    /// Persist a successor of `predecessor` without overwriting anything.
    ///
    /// A name is taken when the descriptor, its journal, or one of the data
    /// files it introduces over `predecessor` already exists. The successor
    /// counter of the descriptor and of those data files is then bumped in
    /// step until a free name is found. A descriptor with identical content
    /// and no journal yet is reused as is. Returns the path actually used.
    async fn create(
        &self,
        descriptor: &JobDescriptor,
        predecessor: &JobDescriptor,
    ) -> DomainResult<PathBuf>;

    /// Delete the descriptor at `path`.
    async fn remove(&self, path: &Path) -> DomainResult<()>;
}
