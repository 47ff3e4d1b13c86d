//! Outcome of a finished solver run.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::journal::{keys, Journal};

/// Termination reasons reported by the solver, in the solver's own spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    MaxRuntimeExceeded,
    MaxIterationsExceeded,
    MaxComplementarityExceeded,
    PrimalFeasibleJumpDetected,
    DualFeasibleJumpDetected,
    FoundPrimalFeasibleSolution,
    FoundDualFeasibleSolution,
    FoundPrimalDualOptimalSolution,
}

impl TerminationReason {
    pub const ALL: [Self; 8] = [
        Self::MaxRuntimeExceeded,
        Self::MaxIterationsExceeded,
        Self::MaxComplementarityExceeded,
        Self::PrimalFeasibleJumpDetected,
        Self::DualFeasibleJumpDetected,
        Self::FoundPrimalFeasibleSolution,
        Self::FoundDualFeasibleSolution,
        Self::FoundPrimalDualOptimalSolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxRuntimeExceeded => "maxRuntime exceeded",
            Self::MaxIterationsExceeded => "maxIterations exceeded",
            Self::MaxComplementarityExceeded => "maxComplementarity exceeded",
            Self::PrimalFeasibleJumpDetected => "primal feasible jump detected",
            Self::DualFeasibleJumpDetected => "dual feasible jump detected",
            Self::FoundPrimalFeasibleSolution => "found primal feasible solution",
            Self::FoundDualFeasibleSolution => "found dual feasible solution",
            Self::FoundPrimalDualOptimalSolution => "found primal-dual optimal solution",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|reason| reason.as_str() == s)
    }

    /// The run ran out of its runtime or iteration budget.
    pub fn is_budget_timeout(&self) -> bool {
        matches!(self, Self::MaxRuntimeExceeded | Self::MaxIterationsExceeded)
    }

    /// The solver lost numeric precision and jumped to a feasible point.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Self::PrimalFeasibleJumpDetected | Self::DualFeasibleJumpDetected
        )
    }

    /// The solver reached a definite answer.
    pub fn is_found(&self) -> bool {
        matches!(
            self,
            Self::FoundPrimalFeasibleSolution
                | Self::FoundDualFeasibleSolution
                | Self::FoundPrimalDualOptimalSolution
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric output of the solver. Kept exact when it parses as a decimal,
/// raw text otherwise (solvers print things like `nan`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    Decimal(BigDecimal),
    Raw(String),
}

impl Measurement {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        BigDecimal::from_str(trimmed)
            .map_or_else(|_| Self::Raw(trimmed.to_string()), Self::Decimal)
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Self::Decimal(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

/// Terminal result of a finished run, read from the journal's last recorded
/// values for each outcome key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Raw `terminateReason` value, if any was recorded
    pub termination_reason: Option<String>,
    pub primal_objective: Option<Measurement>,
    pub dual_objective: Option<Measurement>,
    pub duality_gap: Option<Measurement>,
    pub primal_error: Option<Measurement>,
    pub dual_error: Option<Measurement>,
    pub runtime: Option<Measurement>,
}

impl Outcome {
    /// Outcome with only a termination reason, mostly useful in tests.
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            termination_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn from_journal(journal: &Journal) -> Self {
        let measurement = |key: &str| journal.last_value(key, None).map(Measurement::parse);
        Self {
            termination_reason: journal
                .last_value(keys::TERMINATE_REASON, None)
                .map(|s| s.trim().to_string()),
            primal_objective: measurement(keys::PRIMAL_OBJECTIVE),
            dual_objective: measurement(keys::DUAL_OBJECTIVE),
            duality_gap: measurement(keys::DUALITY_GAP),
            primal_error: measurement(keys::PRIMAL_ERROR),
            dual_error: measurement(keys::DUAL_ERROR),
            runtime: measurement(keys::RUNTIME),
        }
    }

    /// The recognized termination reason, if the raw value is one.
    pub fn reason(&self) -> Option<TerminationReason> {
        self.termination_reason
            .as_deref()
            .and_then(TerminationReason::from_str)
    }
}
