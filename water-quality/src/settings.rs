//! Evaluation settings passed in at construction time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ThresholdSetting};
use crate::error::SettingsError;
use crate::ledger::DEFAULT_HISTORY_CAP;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_PERSIST_EVERY_N_TICKS: u64 = 100;

/// Recognised options: threshold overrides, tick interval, persistence
/// cadence and history retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thresholds: BTreeMap<String, ThresholdSetting>,
    #[serde(alias = "tickIntervalMs")]
    pub tick_interval_ms: u64,
    #[serde(alias = "persistEveryNTicks")]
    pub persist_every_n_ticks: u64,
    #[serde(alias = "historyCap")]
    pub history_cap: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thresholds: BTreeMap::new(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            persist_every_n_ticks: DEFAULT_PERSIST_EVERY_N_TICKS,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.tick_interval_ms == 0 {
            return Err(SettingsError::ZeroTickInterval);
        }
        if self.persist_every_n_ticks == 0 {
            return Err(SettingsError::ZeroPersistCadence);
        }
        if self.history_cap == 0 {
            return Err(SettingsError::ZeroHistoryCap);
        }
        self.catalog()?;
        Ok(())
    }

    /// Default catalog with this settings' threshold overrides applied.
    pub fn catalog(&self) -> Result<Catalog, SettingsError> {
        Ok(Catalog::default().with_overrides(&self.thresholds)?)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::parameter::Parameter;

    #[test]
    fn defaults_match_reference_cadence() {
        let s = Settings::default();
        assert_eq!(s.tick_interval_ms, 3000);
        assert_eq!(s.persist_every_n_ticks, 100);
        assert_eq!(s.history_cap, 1000);
        assert_eq!(s.validate(), Ok(()));
    }

    #[test]
    fn accepts_camel_case_options() {
        let json = r#"{
            "thresholds": {"temperature": {"safe": 24, "warning": 27}},
            "tickIntervalMs": 500,
            "persistEveryNTicks": 10
        }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.tick_interval_ms, 500);
        assert_eq!(s.persist_every_n_ticks, 10);
        assert_eq!(s.history_cap, 1000);
        let catalog = s.catalog().unwrap();
        assert_eq!(catalog.get(Parameter::Temperature).unwrap().warning_threshold, 27.0);
    }

    #[test]
    fn zero_values_rejected() {
        let s = Settings { tick_interval_ms: 0, ..Settings::default() };
        assert_eq!(s.validate(), Err(SettingsError::ZeroTickInterval));
        let s = Settings { persist_every_n_ticks: 0, ..Settings::default() };
        assert_eq!(s.validate(), Err(SettingsError::ZeroPersistCadence));
        let s = Settings { history_cap: 0, ..Settings::default() };
        assert_eq!(s.validate(), Err(SettingsError::ZeroHistoryCap));
    }

    #[test]
    fn inconsistent_threshold_is_fatal() {
        let mut s = Settings::default();
        s.thresholds.insert("waterLevel".into(), ThresholdSetting::new(80.0, 85.0));
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Catalog(CatalogError::Inverted { .. }))
        ));
    }
}
