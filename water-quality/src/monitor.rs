//! Synchronous evaluation pipeline for one tick.

use tracing::debug;

use crate::alert::Alert;
use crate::catalog::Catalog;
use crate::dedup::NotificationDeduplicator;
use crate::error::SettingsError;
use crate::evaluated::EvaluatedReading;
use crate::ledger::{HistoryLedger, HistoryStats};
use crate::reading::Reading;
use crate::settings::Settings;

/// What one call to [`Monitor::process`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub evaluated: EvaluatedReading,
    /// Alerts to surface to the user; a subset of `evaluated.alerts`.
    pub notifications: Vec<Alert>,
}

/// Evaluator plus the stateful pieces (ledger, seen-sets) it feeds.
#[derive(Debug, Clone)]
pub struct Monitor {
    catalog: Catalog,
    ledger: HistoryLedger,
    dedup: NotificationDeduplicator,
}

impl Monitor {
    pub fn new(catalog: Catalog, history_cap: usize) -> Self {
        Self {
            catalog,
            ledger: HistoryLedger::with_cap(history_cap),
            dedup: NotificationDeduplicator::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self::new(settings.catalog()?, settings.history_cap))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Evaluate, record in history and deduplicate.
    pub fn process(&mut self, pool_id: &str, reading: &Reading) -> ProcessOutcome {
        let evaluated = EvaluatedReading::evaluate(pool_id, reading, &self.catalog);
        self.ledger.append(pool_id, evaluated.clone());
        let notifications = self.dedup.filter_new(pool_id, &evaluated.alerts, &evaluated.statuses);

        debug!(
            pool_id,
            grade = %evaluated.quality.grade,
            alerts = evaluated.alerts.len(),
            notifications = notifications.len(),
            "reading evaluated"
        );
        ProcessOutcome { evaluated, notifications }
    }

    /// Undo the seen-marking for notifications that could not be recorded.
    pub fn withdraw(&mut self, pool_id: &str, notifications: &[Alert]) {
        self.dedup.forget(pool_id, notifications);
    }

    /// Seed history without touching the seen-sets. `entries` are newest
    /// first, as returned by [`Monitor::history`].
    pub fn restore(&mut self, pool_id: &str, entries: Vec<EvaluatedReading>) {
        for entry in entries.into_iter().rev() {
            self.ledger.append(pool_id, entry);
        }
    }

    pub fn history(&self, pool_id: &str, limit: Option<usize>) -> Vec<EvaluatedReading> {
        self.ledger.query(pool_id, limit)
    }

    pub fn stats(&self, pool_id: &str) -> HistoryStats {
        self.ledger.stats(pool_id)
    }

    pub fn clear_history(&mut self, pool_id: &str) {
        self.ledger.clear(pool_id);
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
