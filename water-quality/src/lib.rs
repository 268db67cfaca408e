//! Water-quality evaluation for fish-farm pools.
//!
//! Turns raw sensor readings into per-parameter statuses, an aggregate
//! quality grade and threshold alerts, keeps a bounded history per pool
//! and decides which alerts are new enough to notify.
//!
//! Everything here is synchronous and free of I/O; the service shell in
//! `bassin-monitor` supplies sensors, storage and scheduling.

pub mod alert;
pub mod catalog;
pub mod dedup;
pub mod error;
pub mod evaluated;
pub mod export;
pub mod ledger;
pub mod monitor;
pub mod parameter;
pub mod quality;
pub mod reading;
pub mod settings;
pub mod status;

pub use alert::{Alert, AlertSeverity};
pub use catalog::{Catalog, Directionality, ParameterSpec, ThresholdSetting};
pub use dedup::NotificationDeduplicator;
pub use error::{CatalogError, ExportError, SettingsError};
pub use evaluated::EvaluatedReading;
pub use ledger::{DateRange, HistoryLedger, HistoryStats};
pub use monitor::{Monitor, ProcessOutcome};
pub use parameter::Parameter;
pub use quality::{Grade, QualityAssessment};
pub use reading::Reading;
pub use settings::Settings;
pub use status::{Evaluation, Status};
