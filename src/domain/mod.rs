//! Domain layer for the job babysitter
//!
//! This module contains the lifecycle model (journal, descriptors, outcomes)
//! and the ports the services drive.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AnalysisError, DomainError, DomainResult};
