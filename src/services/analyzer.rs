//! Decision engine: what a finished job should do next.
//!
//! [`decide`] is a pure function of a descriptor, the outcome recorded in its
//! journal, and the policy. It never touches the filesystem; successor
//! descriptors are returned as values for the driver to persist.

use bigdecimal::BigDecimal;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::errors::AnalysisError;
use crate::domain::models::descriptor::successor_name;
use crate::domain::models::{
    AnalyzerConfig, BinarySearch, JobDescriptor, JumpPolicy, Outcome, SearchDirective,
    TerminationReason,
};

/// Tunables of the decision engine, parsed from [`AnalyzerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerPolicy {
    pub jump_detected: JumpPolicy,
    pub baseline_precision: u32,
    pub matrix_scale_divisor: BigDecimal,
    pub default_matrix_scale: BigDecimal,
}

impl AnalyzerPolicy {
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalysisError> {
        let matrix_scale_divisor =
            parse_decimal("matrix_scale_divisor", &config.matrix_scale_divisor)?;
        if matrix_scale_divisor <= BigDecimal::from(0) {
            return Err(AnalysisError::MalformedParameter {
                name: "matrix_scale_divisor".to_string(),
                value: config.matrix_scale_divisor.clone(),
            });
        }
        Ok(Self {
            jump_detected: config.jump_detected,
            baseline_precision: config.baseline_precision,
            matrix_scale_divisor,
            default_matrix_scale: parse_decimal(
                "default_matrix_scale",
                &config.default_matrix_scale,
            )?,
        })
    }
}

impl Default for AnalyzerPolicy {
    fn default() -> Self {
        Self {
            jump_detected: JumpPolicy::EscalatePrecision,
            baseline_precision: 800,
            matrix_scale_divisor: BigDecimal::from(100),
            default_matrix_scale: BigDecimal::from(1_000_000_000_000_000_000_u64),
        }
    }
}

/// Next step for a finished job.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The run ran out of budget; submit the same descriptor again
    Resubmit,
    /// Rerun with doubled precision
    EscalatePrecision(JobDescriptor),
    /// Rerun with smaller initial matrix scales
    RescaleMatrices(JobDescriptor),
    /// Binary search step; `None` once the interval is narrower than the threshold
    Bisect(Option<JobDescriptor>),
    /// Nothing left to do
    Conclude,
}

impl Action {
    /// Successor descriptor to continue with, if any.
    pub fn successor(&self) -> Option<&JobDescriptor> {
        match self {
            Self::EscalatePrecision(next) | Self::RescaleMatrices(next) => Some(next),
            Self::Bisect(next) => next.as_ref(),
            Self::Resubmit | Self::Conclude => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Resubmit => "resubmit",
            Self::EscalatePrecision(_) => "escalate-precision",
            Self::RescaleMatrices(_) => "rescale-matrices",
            Self::Bisect(Some(_)) => "bisect",
            Self::Bisect(None) => "bisect-converged",
            Self::Conclude => "conclude",
        }
    }
}

/// Which side of the search boundary a run landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primal,
    Dual,
}

/// Decide the next action for a finished job.
pub fn decide(
    descriptor: &JobDescriptor,
    outcome: &Outcome,
    policy: &AnalyzerPolicy,
) -> Result<Action, AnalysisError> {
    let raw = outcome
        .termination_reason
        .as_deref()
        .ok_or(AnalysisError::MissingTerminationReason)?;
    let reason = TerminationReason::from_str(raw)
        .ok_or_else(|| AnalysisError::UnknownTerminationReason(raw.to_string()))?;

    let search = match descriptor.search_directive() {
        SearchDirective::Unsupported(mode) => {
            return Err(AnalysisError::UnsupportedSearchMode(mode.to_string()))
        }
        SearchDirective::Binary(search) => Some(search),
        SearchDirective::None => None,
    };

    match reason {
        TerminationReason::MaxRuntimeExceeded | TerminationReason::MaxIterationsExceeded => {
            Ok(Action::Resubmit)
        }
        TerminationReason::MaxComplementarityExceeded => {
            rescale_matrices(descriptor, policy).map(Action::RescaleMatrices)
        }
        TerminationReason::PrimalFeasibleJumpDetected
        | TerminationReason::DualFeasibleJumpDetected => match (policy.jump_detected, search) {
            (JumpPolicy::Bisect, Some(search)) => {
                bisect(descriptor, search, reason).map(Action::Bisect)
            }
            _ => escalate_precision(descriptor, policy).map(Action::EscalatePrecision),
        },
        TerminationReason::FoundPrimalFeasibleSolution
        | TerminationReason::FoundDualFeasibleSolution
        | TerminationReason::FoundPrimalDualOptimalSolution => match search {
            Some(search) => bisect(descriptor, search, reason).map(Action::Bisect),
            None => Ok(Action::Conclude),
        },
    }
}

/// Copy of `descriptor` under its successor name.
fn successor_of(descriptor: &JobDescriptor) -> JobDescriptor {
    let path = PathBuf::from(successor_name(&descriptor.path().to_string_lossy()));
    descriptor.clone().with_path(path)
}

fn escalate_precision(
    descriptor: &JobDescriptor,
    policy: &AnalyzerPolicy,
) -> Result<JobDescriptor, AnalysisError> {
    let precision = match descriptor.solver.precision {
        Some(current) => current
            .checked_mul(2)
            .ok_or(AnalysisError::PrecisionOverflow(current))?,
        None => policy.baseline_precision,
    };
    let mut next = successor_of(descriptor);
    next.solver.precision = Some(precision);
    Ok(next)
}

fn rescale_matrices(
    descriptor: &JobDescriptor,
    policy: &AnalyzerPolicy,
) -> Result<JobDescriptor, AnalysisError> {
    let rescale = |name: &str, current: Option<&String>| -> Result<String, AnalysisError> {
        match current {
            Some(value) => {
                let value = parse_decimal(name, value)?;
                Ok(decimal_string(&(value / &policy.matrix_scale_divisor)))
            }
            None => Ok(decimal_string(&policy.default_matrix_scale)),
        }
    };
    let mut next = successor_of(descriptor);
    next.solver.initial_matrix_scale_primal = Some(rescale(
        "initial_matrix_scale_primal",
        descriptor.solver.initial_matrix_scale_primal.as_ref(),
    )?);
    next.solver.initial_matrix_scale_dual = Some(rescale(
        "initial_matrix_scale_dual",
        descriptor.solver.initial_matrix_scale_dual.as_ref(),
    )?);
    Ok(next)
}

fn side_of(reason: TerminationReason) -> Option<Side> {
    match reason {
        TerminationReason::FoundPrimalFeasibleSolution
        | TerminationReason::PrimalFeasibleJumpDetected => Some(Side::Primal),
        TerminationReason::FoundDualFeasibleSolution
        | TerminationReason::DualFeasibleJumpDetected => Some(Side::Dual),
        _ => None,
    }
}

/// One binary search step.
fn bisect(
    descriptor: &JobDescriptor,
    search: &BinarySearch,
    reason: TerminationReason,
) -> Result<Option<JobDescriptor>, AnalysisError> {
    let side = side_of(reason).ok_or(AnalysisError::InvalidBisectionOutcome(reason))?;

    let (record_index, current_raw) = descriptor
        .find_variable(&search.variable)
        .ok_or_else(|| {
            AnalysisError::MalformedSearchRecord(format!(
                "no data record declares variable '{}'",
                search.variable
            ))
        })?;
    let current = parse_search_value(&search.variable, current_raw)?;
    let mut primal = parse_search_value("primal", &search.primal)?;
    let mut dual = parse_search_value("dual", &search.dual)?;
    let threshold = parse_search_value("threshold", &search.threshold)?;

    let (low, high) = if primal < dual { (&primal, &dual) } else { (&dual, &primal) };
    if !(low < &current && &current < high) {
        return Err(AnalysisError::MalformedSearchRecord(format!(
            "{} = {} lies outside the bracket ({}, {})",
            search.variable, current_raw, search.primal, search.dual
        )));
    }

    let mut record = search.clone();
    match side {
        Side::Primal => {
            primal = current;
            record.primal = current_raw.to_string();
        }
        Side::Dual => {
            dual = current;
            record.dual = current_raw.to_string();
        }
    }

    if (&dual - &primal).abs() < threshold {
        return Ok(None);
    }

    let midpoint = (primal + dual).half();
    let mut next = successor_of(descriptor);
    next.search.binary_search = Some(record);
    let data = &mut next.data[record_index];
    data.variables
        .insert(search.variable.clone(), decimal_string(&midpoint));
    data.filename = successor_name(&data.filename);
    Ok(Some(next))
}

fn parse_decimal(name: &str, value: &str) -> Result<BigDecimal, AnalysisError> {
    BigDecimal::from_str(value.trim()).map_err(|_| AnalysisError::MalformedParameter {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_search_value(name: &str, value: &str) -> Result<BigDecimal, AnalysisError> {
    BigDecimal::from_str(value.trim())
        .map_err(|_| AnalysisError::MalformedSearchRecord(format!("{name} = '{value}'")))
}

/// Plain decimal text without redundant trailing zeros.
pub fn decimal_string(value: &BigDecimal) -> String {
    let normalized = value.normalized();
    if normalized.as_bigint_and_exponent().1 < 0 {
        normalized.with_scale(0).to_string()
    } else {
        normalized.to_string()
    }
}
