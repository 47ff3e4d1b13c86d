pub mod config;
pub mod descriptor;
pub mod failure;
pub mod job_status;
pub mod journal;
pub mod outcome;

pub use config::{
    AnalyzerConfig, BackendConfig, BackendKind, BatchConfig, Config, DriverConfig,
    ExecutablesConfig, JumpPolicy, LoggingConfig,
};
pub use descriptor::{
    BinarySearch, DataRecord, JobDescriptor, SearchDirective, SolverParams, StagingSpec,
};
pub use failure::FailureKind;
pub use job_status::JobStatus;
pub use journal::{Journal, JournalEntry};
pub use outcome::{Measurement, Outcome, TerminationReason};
