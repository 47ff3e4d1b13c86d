//! Failure kinds recorded in the journal when a job is marked failed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a job ended up in the `failed` status.
///
/// The string form is what the driver writes as the `errorKind` journal value,
/// so operators can tell a capability gap from a transient fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The backend could not submit or execute the job
    ProcessFailure,
    /// The solver finished without writing its output file
    MissingOutput,
    /// The recorded terminateReason is absent or not recognized
    UnknownTerminationReason,
    /// The descriptor asks for a search mode that is not implemented
    UnsupportedSearchMode,
    /// Resubmission was withheld because the submission ceiling was reached
    SubmissionCeilingExceeded,
    /// The backend no longer knows about a job we believed to be running
    LostSubmission,
    /// The journal holds a status value we cannot interpret
    CorruptJournal,
    /// The binary search record or its outcome is inconsistent
    InvalidBisection,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessFailure => "ProcessFailure",
            Self::MissingOutput => "MissingOutput",
            Self::UnknownTerminationReason => "UnknownTerminationReason",
            Self::UnsupportedSearchMode => "UnsupportedSearchMode",
            Self::SubmissionCeilingExceeded => "SubmissionCeilingExceeded",
            Self::LostSubmission => "LostSubmission",
            Self::CorruptJournal => "CorruptJournal",
            Self::InvalidBisection => "InvalidBisection",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ProcessFailure" => Some(Self::ProcessFailure),
            "MissingOutput" => Some(Self::MissingOutput),
            "UnknownTerminationReason" => Some(Self::UnknownTerminationReason),
            "UnsupportedSearchMode" => Some(Self::UnsupportedSearchMode),
            "SubmissionCeilingExceeded" => Some(Self::SubmissionCeilingExceeded),
            "LostSubmission" => Some(Self::LostSubmission),
            "CorruptJournal" => Some(Self::CorruptJournal),
            "InvalidBisection" => Some(Self::InvalidBisection),
            _ => None,
        }
    }

    /// Failures an operator may want to force past with `--force`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ProcessFailure | Self::MissingOutput | Self::LostSubmission
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
