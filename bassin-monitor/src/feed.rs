//! Rolling list of the most recent alerts for one pool.

use std::collections::VecDeque;

use water_quality::Alert;

#[derive(Debug, Clone)]
pub struct AlertFeed {
    cap: usize,
    alerts: VecDeque<Alert>,
}

impl AlertFeed {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { cap, alerts: VecDeque::with_capacity(cap) }
    }

    /// Prepend a tick's alerts, keeping their order, then drop the oldest.
    pub fn push_batch(&mut self, batch: &[Alert]) {
        for alert in batch.iter().rev() {
            self.alerts.push_front(alert.clone());
        }
        self.alerts.truncate(self.cap);
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use water_quality::{AlertSeverity, Parameter};

    fn alert(parameter: Parameter, minute: i64) -> Alert {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Alert {
            id: Alert::stable_id("p", parameter, ts),
            pool_id: "p".into(),
            parameter,
            severity: AlertSeverity::Warning,
            message: String::new(),
            value: 0.0,
            timestamp: ts,
            acknowledged: false,
        }
    }

    #[test]
    fn newest_batch_goes_first_in_its_own_order() {
        let mut feed = AlertFeed::new(10);
        feed.push_batch(&[alert(Parameter::Ph, 0)]);
        feed.push_batch(&[alert(Parameter::Temperature, 1), alert(Parameter::Ammonia, 1)]);
        let params: Vec<_> = feed.recent().iter().map(|a| a.parameter).collect();
        assert_eq!(params, vec![Parameter::Temperature, Parameter::Ammonia, Parameter::Ph]);
    }

    #[test]
    fn cap_drops_oldest() {
        let mut feed = AlertFeed::new(3);
        for minute in 0..5 {
            feed.push_batch(&[alert(Parameter::Nitrite, minute)]);
        }
        assert_eq!(feed.len(), 3);
        let minutes: Vec<_> = feed.recent().iter().map(|a| a.timestamp.timestamp() / 60 % 60).collect();
        assert_eq!(minutes, vec![4, 3, 2]);
        feed.clear();
        assert!(feed.is_empty());
    }
}
