//! Application layer: orchestration of the lifecycle services.

pub mod babysitter;
pub mod worker;

pub use babysitter::{Babysitter, JobResult};
pub use worker::{SubmissionWait, Worker, WorkerOutcome};
