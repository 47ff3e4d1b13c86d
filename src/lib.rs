//! Babysitter - adaptive resubmission of long-running optimization jobs
//!
//! Every job is a YAML descriptor with an append-only journal next to it. The
//! lifecycle driver reads the journal, submits the job through an execution
//! backend, and once the solver has finished asks the decision engine what to
//! do next: resubmit, write a successor descriptor with adjusted parameters,
//! continue a binary search, or conclude.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): descriptors, journals, outcomes and the port traits
//! - **Adapters** (`adapters`): file and in-memory stores, execution backends
//! - **Service Layer** (`services`): the decision engine and the lifecycle driver
//! - **Application Layer** (`application`): the concurrent babysitter and the worker
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Babysitter, Worker};
pub use domain::errors::{AnalysisError, DomainError, DomainResult};
pub use domain::models::{Config, JobDescriptor, JobStatus, Journal, JournalEntry, Outcome};
pub use domain::ports::{DescriptorStore, ExecutionBackend, JournalStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{decide, Action, AnalyzerPolicy, LifecycleDriver};
