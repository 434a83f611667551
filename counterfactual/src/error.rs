//! Typed error kinds for the counterfactual engine.
//!
//! Callers need to tell configuration mistakes, per-subject simulation
//! failures and contract violations apart (the failure policy only applies to
//! the second kind), so these are enums rather than `anyhow` strings.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::core::types::Biomarker;

/// Configuration rejected before any simulation starts.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure raised by a simulator for one trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("{biomarker} became {value} at time {time}")]
    InvalidState {
        time: usize,
        biomarker: Biomarker,
        value: f64,
    },

    #[error("timed out at time {time} after {elapsed_ms} ms")]
    Timeout { time: usize, elapsed_ms: u128 },

    #[error("trajectory has {actual} states, expected {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("simulator failed: {0}")]
    Failed(String),
}

/// Programming-contract violation. Always fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("propensity {value} outside [0, 1]")]
    PropensityOutOfRange { value: f64 },

    #[error("covariate {column} is not finite ({value})")]
    NonFiniteCovariate { column: String, value: f64 },

    #[error("outcome is not finite ({value})")]
    NonFiniteOutcome { value: f64 },

    #[error("no state at time {time} (trajectory length {len})")]
    MissingState { time: usize, len: usize },
}

/// Which potential-outcome branch a simulation belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Untreated,
    Treated,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Untreated => f.write_str("untreated"),
            Branch::Treated => f.write_str("treated"),
        }
    }
}

/// Failure resolving a single subject.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubjectError {
    #[error("{branch} branch simulation failed")]
    Simulation {
        branch: Branch,
        #[source]
        source: SimulationError,
    },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Failure of a whole orchestrated run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("replication {replication} subject {subject}")]
    SubjectFailed {
        replication: u32,
        subject: u32,
        #[source]
        source: SubjectError,
    },

    #[error("replication {replication} subject {subject}: invariant violated")]
    Invariant {
        replication: u32,
        subject: u32,
        #[source]
        source: InvariantViolation,
    },

    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl RunError {
    pub(crate) fn from_subject(replication: u32, subject: u32, err: SubjectError) -> Self {
        match err {
            SubjectError::Invariant(source) => RunError::Invariant {
                replication,
                subject,
                source,
            },
            err @ SubjectError::Simulation { .. } => RunError::SubjectFailed {
                replication,
                subject,
                source: err,
            },
        }
    }
}

/// Render an error and its sources as `outer: cause: root`.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
