//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - ExecutionBackend: submitting, polling and running jobs
//! - JournalStore: append-only per-job event logs
//! - DescriptorStore: job descriptor files
//!
//! These traits keep the lifecycle driver independent of where jobs run and
//! where their files live.

pub mod backend;
pub mod descriptor_store;
pub mod journal_store;

pub use backend::{ExecutionBackend, SubmissionId};
pub use descriptor_store::DescriptorStore;
pub use journal_store::JournalStore;
