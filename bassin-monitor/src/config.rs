//! Service configuration.
//!
//! Layered with the `config` crate: an optional file (`BASSIN_CONFIG`,
//! default `bassin.toml`) overridden by `BASSIN_*` environment variables.
//! Nested keys use `__`, e.g. `BASSIN_THRESHOLDS__TEMPERATURE__SAFE=21`.
//! A threshold override may set `safe`, `warning` or both; the other side
//! keeps its built-in value.
//!
//! | Key                      | Default        |
//! |--------------------------|----------------|
//! | `pools`                  | `bassin-1`     |
//! | `user_id`                | `system`       |
//! | `tick_interval_ms`       | `3000`         |
//! | `persist_every_n_ticks`  | `100`          |
//! | `history_cap`            | `1000`         |
//! | `alert_feed_cap`         | `10`           |
//! | `seed_history`           | `0`            |
//! | `thresholds.<key>`       | built-in table |

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use water_quality::{Catalog, Settings, SettingsError};

pub const DEFAULT_CONFIG_PATH: &str = "bassin.toml";
pub const DEFAULT_ALERT_FEED_CAP: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one pool must be configured")]
    NoPools,
    #[error("pool ids must not be blank")]
    BlankPoolId,
    #[error("alert_feed_cap must be greater than zero")]
    ZeroFeedCap,
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub pools: Vec<String>,
    /// Owner recorded on alerts written to the alert store.
    pub user_id: String,
    #[serde(alias = "alertFeedCap")]
    pub alert_feed_cap: usize,
    /// Synthesised back-dated readings to seed an empty ledger with.
    #[serde(alias = "seedHistory")]
    pub seed_history: usize,
    #[serde(flatten)]
    pub settings: Settings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pools: vec!["bassin-1".to_string()],
            user_id: "system".to_string(),
            alert_feed_cap: DEFAULT_ALERT_FEED_CAP,
            seed_history: 0,
            settings: Settings::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from the file named by `BASSIN_CONFIG` plus the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("BASSIN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let raw = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("BASSIN")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pools")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration (file '{path}')"))?;
        Self::from_raw(raw)
    }

    /// Parse a TOML document; used for embedded defaults and tests.
    pub fn from_toml(text: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .context("Failed to parse TOML configuration")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: config::Config) -> Result<Self> {
        let cfg: MonitorConfig = raw.try_deserialize().context("Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::NoPools);
        }
        if self.pools.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::BlankPoolId);
        }
        if self.alert_feed_cap == 0 {
            return Err(ConfigError::ZeroFeedCap);
        }
        self.settings.validate()?;
        Ok(())
    }

    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        Ok(self.settings.catalog()?)
    }
}
