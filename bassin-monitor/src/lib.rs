//! Service shell around the `water-quality` pipeline: configuration,
//! collaborators (sensors, stores, notification sinks) and the per-pool
//! scheduler.

pub mod alert_store;
pub mod config;
pub mod feed;
pub mod history_store;
pub mod notify;
pub mod scheduler;
pub mod sensor;
