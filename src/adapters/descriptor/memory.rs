//! In-memory descriptor store for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::JobDescriptor;
use crate::domain::ports::DescriptorStore;

/// Descriptor store keeping descriptors in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDescriptorStore {
    descriptors: Arc<RwLock<HashMap<PathBuf, JobDescriptor>>>,
}

impl MemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor, bypassing the no-overwrite rule.
    pub async fn insert(&self, descriptor: JobDescriptor) {
        let mut descriptors = self.descriptors.write().await;
        descriptors.insert(descriptor.path().to_path_buf(), descriptor);
    }

    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.descriptors.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl DescriptorStore for MemoryDescriptorStore {
    async fn load(&self, path: &Path) -> DomainResult<JobDescriptor> {
        self.descriptors
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| DomainError::DescriptorNotFound(path.to_path_buf()))
    }

    async fn exists(&self, path: &Path) -> DomainResult<bool> {
        Ok(self.descriptors.read().await.contains_key(path))
    }

    async fn create(
        &self,
        descriptor: &JobDescriptor,
        predecessor: &JobDescriptor,
    ) -> DomainResult<PathBuf> {
        let fresh = descriptor.fresh_records(predecessor);
        let mut descriptors = self.descriptors.write().await;
        let mut candidate = descriptor.clone();
        while let Some(existing) = descriptors.get(candidate.path()) {
            if *existing == candidate {
                return Ok(candidate.path().to_path_buf());
            }
            candidate.advance_counter(&fresh);
        }
        let path = candidate.path().to_path_buf();
        descriptors.insert(path.clone(), candidate);
        Ok(path)
    }

    async fn remove(&self, path: &Path) -> DomainResult<()> {
        self.descriptors
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DomainError::DescriptorNotFound(path.to_path_buf()))
    }
}
