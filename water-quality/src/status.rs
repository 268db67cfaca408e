//! Per-parameter status evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Directionality, ParameterSpec};

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// Tri-state classification of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Safe,
    Warning,
    Danger,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Safe    => "Safe",
            Status::Warning => "Warning",
            Status::Danger  => "Danger",
        }
    }

    pub fn is_breach(self) -> bool {
        self != Status::Safe
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of evaluating one value against its spec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub status: Status,
    /// The value actually compared: the input, or the parameter fallback.
    pub safe_value: f64,
}

// ------------------------------------------------------------------ //
//  Evaluation                                                         //
// ------------------------------------------------------------------ //

/// Classify `value` against `spec`. Missing or non-finite input is replaced
/// by the parameter's fallback before comparison; boundaries are inclusive
/// on the healthier side.
pub fn evaluate(value: Option<f64>, spec: &ParameterSpec) -> Evaluation {
    let safe_value = spec.parameter.normalize(value);
    let status = match spec.directionality {
        Directionality::HigherIsWorse => {
            if safe_value <= spec.safe_threshold {
                Status::Safe
            } else if safe_value <= spec.warning_threshold {
                Status::Warning
            } else {
                Status::Danger
            }
        }
        Directionality::LowerIsWorse => {
            if safe_value >= spec.safe_threshold {
                Status::Safe
            } else if safe_value >= spec.warning_threshold {
                Status::Warning
            } else {
                Status::Danger
            }
        }
    };
    Evaluation { status, safe_value }
}

/// Most severe status in the set; `Safe` when empty.
pub fn worst(statuses: impl IntoIterator<Item = Status>) -> Status {
    statuses.into_iter().max().unwrap_or(Status::Safe)
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
