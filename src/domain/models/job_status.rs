//! Job status domain model.
//!
//! The status of a job is never stored anywhere but in its journal: it is the
//! value of the last `status` entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a job in the babysitting lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No `status` entry recorded yet
    #[default]
    Unsubmitted,
    /// Marked for (re)submission on the next driver pass
    ToSubmit,
    /// Handed to the backend
    Submitted,
    /// The worker started on a compute node
    Running,
    /// The solver run ended and its outcome is in the journal
    Finished,
    /// Nothing left to do for this descriptor
    Concluded,
    /// Terminal failure, escaped only by forced resubmission
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsubmitted => "unsubmitted",
            Self::ToSubmit => "tosubmit",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Concluded => "concluded",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unsubmitted" => Some(Self::Unsubmitted),
            "tosubmit" => Some(Self::ToSubmit),
            "submitted" => Some(Self::Submitted),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "concluded" => Some(Self::Concluded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Concluded | Self::Failed)
    }

    /// The job is with the backend and must not be submitted again.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitted | Self::Running)
    }

    /// The next driver pass should call the backend's `submit`.
    pub fn wants_submission(&self) -> bool {
        matches!(self, Self::Unsubmitted | Self::ToSubmit)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
