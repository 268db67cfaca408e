//! Notification deduplication.
//!
//! An alert identity is pool, parameter and severity. Once notified it stays
//! "seen" until an evaluation reports that parameter `Safe` again. A Danger
//! notice covers the Warning identity for the same parameter, so escalation
//! is surfaced once more while a de-escalation is not.

use std::collections::{BTreeMap, HashMap};

use crate::alert::{Alert, AlertSeverity};
use crate::parameter::Parameter;
use crate::status::Status;

#[derive(Debug, Clone, Default)]
pub struct NotificationDeduplicator {
    seen: HashMap<String, HashMap<Parameter, AlertSeverity>>,
}

impl NotificationDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve parameters reported `Safe`, then return the alerts not yet
    /// notified (or escalated past what was notified) and mark them seen.
    pub fn filter_new(
        &mut self,
        pool_id: &str,
        alerts: &[Alert],
        statuses: &BTreeMap<Parameter, Status>,
    ) -> Vec<Alert> {
        let seen = self.seen.entry(pool_id.to_string()).or_default();

        for (parameter, status) in statuses {
            if *status == Status::Safe {
                seen.remove(parameter);
            }
        }

        let mut fresh = Vec::new();
        for alert in alerts {
            let already = seen.get(&alert.parameter).is_some_and(|s| *s >= alert.severity);
            if already {
                continue;
            }
            seen.insert(alert.parameter, alert.severity);
            fresh.push(alert.clone());
        }

        if seen.is_empty() {
            self.seen.remove(pool_id);
        }
        fresh
    }

    /// Severity last notified for an unresolved parameter.
    pub fn seen(&self, pool_id: &str, parameter: Parameter) -> Option<AlertSeverity> {
        self.seen.get(pool_id).and_then(|s| s.get(&parameter)).copied()
    }

    pub fn unresolved(&self, pool_id: &str) -> usize {
        self.seen.get(pool_id).map_or(0, HashMap::len)
    }

    /// Un-mark alerts whose notification could not be recorded, so the
    /// next evaluation raises them again.
    pub fn forget(&mut self, pool_id: &str, alerts: &[Alert]) {
        let Some(seen) = self.seen.get_mut(pool_id) else {
            return;
        };
        for alert in alerts {
            if seen.get(&alert.parameter) == Some(&alert.severity) {
                seen.remove(&alert.parameter);
            }
        }
        if seen.is_empty() {
            self.seen.remove(pool_id);
        }
    }

    pub fn reset(&mut self, pool_id: &str) {
        self.seen.remove(pool_id);
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::evaluated::EvaluatedReading;
    use crate::reading::Reading;
    use chrono::{Duration, TimeZone, Utc};

    fn tick(dedup: &mut NotificationDeduplicator, pool: &str, minute: i64, temp: f64) -> Vec<Alert> {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        let reading = Reading::new(ts).with(Parameter::Temperature, temp);
        let e = EvaluatedReading::evaluate(pool, &reading, &Catalog::default());
        dedup.filter_new(pool, &e.alerts, &e.statuses)
    }

    #[test]
    fn unresolved_alert_is_emitted_once() {
        let mut d = NotificationDeduplicator::new();
        assert_eq!(tick(&mut d, "p", 0, 25.0).len(), 1);
        assert!(tick(&mut d, "p", 1, 25.0).is_empty());
        assert!(tick(&mut d, "p", 2, 21.0).is_empty(), "warning status is still unresolved");
        assert_eq!(d.unresolved("p"), 1);
    }

    #[test]
    fn refires_after_returning_to_safe() {
        let mut d = NotificationDeduplicator::new();
        assert_eq!(tick(&mut d, "p", 0, 25.0).len(), 1);
        assert!(tick(&mut d, "p", 1, 19.0).is_empty());
        assert_eq!(d.unresolved("p"), 0);
        assert_eq!(tick(&mut d, "p", 2, 25.0).len(), 1);
    }

    #[test]
    fn escalation_is_surfaced_but_deescalation_is_not() {
        let mut d = NotificationDeduplicator::new();
        assert_eq!(tick(&mut d, "p", 0, 25.0).len(), 1);
        assert_eq!(d.seen("p", Parameter::Temperature), Some(AlertSeverity::Warning));

        let escalated = tick(&mut d, "p", 1, 40.0);
        assert_eq!(escalated.len(), 1);
        assert_eq!(escalated[0].severity, AlertSeverity::Danger);

        assert!(tick(&mut d, "p", 2, 25.0).is_empty());
        assert!(tick(&mut d, "p", 3, 40.0).is_empty());
    }

    #[test]
    fn pools_are_independent() {
        let mut d = NotificationDeduplicator::new();
        assert_eq!(tick(&mut d, "p", 0, 25.0).len(), 1);
        assert_eq!(tick(&mut d, "q", 0, 25.0).len(), 1);
        d.reset("p");
        assert_eq!(tick(&mut d, "p", 1, 25.0).len(), 1);
        assert!(tick(&mut d, "q", 1, 25.0).is_empty());
    }

    #[test]
    fn forgotten_alerts_are_raised_again() {
        let mut d = NotificationDeduplicator::new();
        let first = tick(&mut d, "p", 0, 25.0);
        d.forget("p", &first);
        assert_eq!(d.unresolved("p"), 0);
        assert_eq!(tick(&mut d, "p", 1, 25.0).len(), 1);
    }
}
