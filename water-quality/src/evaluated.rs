//! Fully evaluated readings, the unit stored in history.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{self, Alert};
use crate::catalog::Catalog;
use crate::parameter::Parameter;
use crate::quality::{self, QualityAssessment};
use crate::reading::Reading;
use crate::status::{self, Status};

pub const NOTE_ALERTS_ACTIVE: &str = "Automated data collection - Alerts active";
pub const NOTE_NORMAL: &str = "Automated data collection - Normal operation";

/// A reading together with everything derived from it at evaluation time.
///
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedReading {
    pub id: Uuid,
    pub pool_id: String,
    pub timestamp: DateTime<Utc>,
    /// Finite values exactly as reported by the sensor.
    pub reported: BTreeMap<Parameter, f64>,
    /// Every recorded parameter after fallback normalisation.
    pub values: BTreeMap<Parameter, f64>,
    /// Status of every catalogued parameter.
    pub statuses: BTreeMap<Parameter, Status>,
    pub quality: QualityAssessment,
    pub alerts: Vec<Alert>,
    pub notes: String,
}

impl EvaluatedReading {
    pub fn evaluate(pool_id: &str, reading: &Reading, catalog: &Catalog) -> Self {
        let reported = reading
            .values
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(p, v)| (*p, *v))
            .collect();
        let values = Parameter::ALL.into_iter().map(|p| (p, reading.value(p))).collect();
        let statuses = catalog
            .iter()
            .map(|spec| (spec.parameter, status::evaluate(reading.raw(spec.parameter), spec).status))
            .collect();
        let alerts = alert::generate_alerts(pool_id, reading, catalog);
        let notes = if alerts.is_empty() { NOTE_NORMAL } else { NOTE_ALERTS_ACTIVE };

        Self {
            id: Self::stable_id(pool_id, reading),
            pool_id: pool_id.to_string(),
            timestamp: reading.timestamp,
            reported,
            values,
            statuses,
            quality: quality::aggregate(reading),
            alerts,
            notes: notes.to_string(),
        }
    }

    /// Name-based UUID over the pool, the full-precision timestamp and every
    /// reported value, so only the same reading maps to the same id.
    pub fn stable_id(pool_id: &str, reading: &Reading) -> Uuid {
        let mut name = format!("{}/{}", pool_id, reading.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true));
        for (parameter, value) in &reading.values {
            name.push_str(&format!("/{}={:016x}", parameter.key(), value.to_bits()));
        }
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }

    /// Normalised value; the fallback if the entry predates the parameter.
    pub fn value(&self, parameter: Parameter) -> f64 {
        self.values.get(&parameter).copied().unwrap_or_else(|| parameter.fallback())
    }

    pub fn status(&self, parameter: Parameter) -> Option<Status> {
        self.statuses.get(&parameter).copied()
    }

    pub fn worst_status(&self) -> Status {
        status::worst(self.statuses.values().copied())
    }

    pub fn active_alerts(&self) -> usize {
        self.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Grade;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn empty_reading_is_excellent_and_quiet() {
        let e = EvaluatedReading::evaluate("bassin-1", &Reading::new(ts()), &Catalog::default());
        assert_eq!(e.quality.grade, Grade::Excellent);
        assert_eq!(e.active_alerts(), 0);
        assert_eq!(e.worst_status(), Status::Safe);
        assert_eq!(e.notes, NOTE_NORMAL);
        assert!(e.reported.is_empty());
        assert_eq!(e.values.len(), Parameter::ALL.len());
        assert_eq!(e.value(Parameter::Plankton), 25_000.0);
        assert_eq!(e.id, EvaluatedReading::stable_id("bassin-1", &Reading::new(ts())));
    }

    #[test]
    fn ids_separate_readings_within_one_millisecond() {
        let catalog = Catalog::default();
        let first = Reading::new(ts()).with(Parameter::Temperature, 20.0);
        let same_ms = Reading::new(ts() + chrono::Duration::microseconds(300)).with(Parameter::Temperature, 20.0);
        let other_value = Reading::new(ts()).with(Parameter::Temperature, 20.5);

        let a = EvaluatedReading::evaluate("bassin-1", &first, &catalog);
        assert_ne!(a.id, EvaluatedReading::evaluate("bassin-1", &same_ms, &catalog).id);
        assert_ne!(a.id, EvaluatedReading::evaluate("bassin-1", &other_value, &catalog).id);
        assert_ne!(a.id, EvaluatedReading::evaluate("bassin-2", &first, &catalog).id);
        assert_eq!(a.id, EvaluatedReading::evaluate("bassin-1", &first.clone(), &catalog).id);
    }

    #[test]
    fn breach_is_reflected_in_status_alerts_and_notes() {
        let reading = Reading::new(ts())
            .with(Parameter::Temperature, 25.0)
            .with(Parameter::Ph, f64::NAN);
        let e = EvaluatedReading::evaluate("bassin-1", &reading, &Catalog::default());
        assert_eq!(e.status(Parameter::Temperature), Some(Status::Danger));
        assert_eq!(e.worst_status(), Status::Danger);
        assert_eq!(e.active_alerts(), 1);
        assert_eq!(e.notes, NOTE_ALERTS_ACTIVE);
        assert_eq!(e.value(Parameter::Ph), 7.2);
        assert!(!e.reported.contains_key(&Parameter::Ph));
        assert_eq!(e.status(Parameter::Plankton), None);
    }

    #[test]
    fn serializes_to_json_and_back() {
        let reading = Reading::new(ts()).with(Parameter::Ammonia, 1.7);
        let e = EvaluatedReading::evaluate("bassin-2", &reading, &Catalog::default());
        let json = serde_json::to_string(&e).unwrap();
        let back: EvaluatedReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, e.id);
        assert_eq!(back.timestamp, e.timestamp);
        assert_eq!(back.alerts, e.alerts);
        assert_eq!(back.statuses, e.statuses);
        assert_eq!(back.quality.grade, e.quality.grade);
        assert_eq!(back.value(Parameter::Ammonia), 1.7);
    }
}
