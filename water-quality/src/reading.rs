//! Raw sensor readings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parameter::Parameter;

/// One timestamped snapshot of sensor values for a pool.
///
/// A parameter that the sensor did not report is simply absent; a NaN or
/// infinite value is kept as reported and normalised at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub values: BTreeMap<Parameter, f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, values: BTreeMap::new() }
    }

    /// Builder-style setter.
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        self.values.insert(parameter, value);
        self
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        self.values.insert(parameter, value);
    }

    /// The value as reported, if any.
    pub fn raw(&self, parameter: Parameter) -> Option<f64> {
        self.values.get(&parameter).copied()
    }

    /// The value with the parameter's fallback applied.
    pub fn value(&self, parameter: Parameter) -> f64 {
        parameter.normalize(self.raw(parameter))
    }
}
