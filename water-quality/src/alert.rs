//! Alert generation with severity escalation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, Directionality, ParameterSpec};
use crate::parameter::Parameter;
use crate::reading::Reading;
use crate::status;

/// Above-warning multiplier that escalates a higher-is-worse alert.
pub const HIGHER_ESCALATION: f64 = 1.5;
/// Below-warning multiplier that escalates a lower-is-worse alert.
pub const LOWER_ESCALATION: f64 = 0.8;

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// Two-level alert severity, independent of the three-level [`status::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Danger,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Danger  => "DANGER",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "DANGER" => AlertSeverity::Danger,
            _        => AlertSeverity::Warning,
        }
    }

    /// Message prefix: "Critical" for danger, "High" otherwise.
    pub fn label(self) -> &'static str {
        match self {
            AlertSeverity::Warning => "High",
            AlertSeverity::Danger  => "Critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A threshold breach attributed to one parameter of one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub pool_id: String,
    pub parameter: Parameter,
    pub severity: AlertSeverity,
    pub message: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Alert {
    /// Name-based id, stable for the same pool, parameter and instant.
    pub fn stable_id(pool_id: &str, parameter: Parameter, timestamp: DateTime<Utc>) -> Uuid {
        let name = format!("{}/{}/{}", pool_id, parameter.key(), timestamp.timestamp_millis());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

// ------------------------------------------------------------------ //
//  Generation                                                         //
// ------------------------------------------------------------------ //

/// Severity from the escalation multipliers alone.
///
/// This intentionally ignores the three-level status: a Danger status
/// that is not far enough past the warning threshold still yields a
/// Warning alert.
pub fn escalate(spec: &ParameterSpec, safe_value: f64) -> AlertSeverity {
    let escalated = match spec.directionality {
        Directionality::HigherIsWorse => safe_value > spec.warning_threshold * HIGHER_ESCALATION,
        Directionality::LowerIsWorse => safe_value < spec.warning_threshold * LOWER_ESCALATION,
    };
    if escalated {
        AlertSeverity::Danger
    } else {
        AlertSeverity::Warning
    }
}

pub fn format_message(severity: AlertSeverity, parameter: Parameter, value: f64) -> String {
    format!(
        "{} {} levels detected: {:.2}{}",
        severity.label(),
        parameter.display_name(),
        value,
        parameter.unit()
    )
}

/// One alert per catalogued parameter whose status is Warning or Danger,
/// in catalog order.
pub fn generate_alerts(pool_id: &str, reading: &Reading, catalog: &Catalog) -> Vec<Alert> {
    catalog
        .iter()
        .filter_map(|spec| {
            let eval = status::evaluate(reading.raw(spec.parameter), spec);
            if !eval.status.is_breach() {
                return None;
            }
            let severity = escalate(spec, eval.safe_value);
            Some(Alert {
                id: Alert::stable_id(pool_id, spec.parameter, reading.timestamp),
                pool_id: pool_id.to_string(),
                parameter: spec.parameter,
                severity,
                message: format_message(severity, spec.parameter, eval.safe_value),
                value: eval.safe_value,
                timestamp: reading.timestamp,
                acknowledged: false,
            })
        })
        .collect()
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
