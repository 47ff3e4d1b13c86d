//! Domain errors for the babysitter.

use std::path::PathBuf;

use thiserror::Error;

use super::models::failure::FailureKind;
use super::models::outcome::TerminationReason;

/// Errors raised while deciding what a finished job should do next.
///
/// Each variant maps onto the [`FailureKind`] recorded in the journal when the
/// driver marks the job failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("no terminateReason recorded")]
    MissingTerminationReason,

    #[error("unrecognized terminateReason: {0}")]
    UnknownTerminationReason(String),

    #[error("search mode '{0}' is not implemented")]
    UnsupportedSearchMode(String),

    #[error("binary search cannot react to terminateReason '{0}'")]
    InvalidBisectionOutcome(TerminationReason),

    #[error("malformed binary search record: {0}")]
    MalformedSearchRecord(String),

    #[error("precision {0} cannot be doubled")]
    PrecisionOverflow(u32),

    #[error("malformed solver parameter {name}: {value}")]
    MalformedParameter { name: String, value: String },
}

impl AnalysisError {
    /// Failure kind recorded in the journal for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::MissingTerminationReason | Self::UnknownTerminationReason(_) => {
                FailureKind::UnknownTerminationReason
            }
            Self::UnsupportedSearchMode(_) => FailureKind::UnsupportedSearchMode,
            Self::InvalidBisectionOutcome(_)
            | Self::MalformedSearchRecord(_)
            | Self::PrecisionOverflow(_)
            | Self::MalformedParameter { .. } => FailureKind::InvalidBisection,
        }
    }

    /// Internal invariant violations must surface to the caller after being
    /// recorded; the rest are ordinary job failures.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidBisectionOutcome(_)
                | Self::MalformedSearchRecord(_)
                | Self::PrecisionOverflow(_)
                | Self::MalformedParameter { .. }
        )
    }
}

/// Domain-level errors that can occur while babysitting jobs.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    #[error("Invalid descriptor {}: {message}", .path.display())]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("Process '{command}' failed with exit code {}", format_code(.code))]
    ProcessFailure { command: String, code: Option<i32> },

    #[error("Solver produced no output file: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Driver exceeded {limit} iterations while handling {}", .path.display())]
    IterationLimitExceeded { path: PathBuf, limit: usize },

    #[error("Unexpected backend response: {0}")]
    BackendResponse(String),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

fn format_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string())
}

impl DomainError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
