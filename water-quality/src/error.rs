//! Error types for catalog construction, settings and CSV import.

use thiserror::Error;

use crate::catalog::Directionality;

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("unknown parameter key '{0}'")]
    UnknownParameter(String),
    #[error("parameter '{0}' has no threshold entry to override")]
    NotMonitored(String),
    #[error("thresholds for '{key}' must be finite (safe={safe}, warning={warning})")]
    NonFinite { key: String, safe: f64, warning: f64 },
    #[error(
        "thresholds for '{key}' are inverted for {direction:?}: safe={safe}, warning={warning}"
    )]
    Inverted {
        key: String,
        direction: Directionality,
        safe: f64,
        warning: f64,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("tick_interval_ms must be greater than zero")]
    ZeroTickInterval,
    #[error("persist_every_n_ticks must be greater than zero")]
    ZeroPersistCadence,
    #[error("history_cap must be greater than zero")]
    ZeroHistoryCap,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ExportError {
    #[error("export is empty")]
    Empty,
    #[error("unexpected header: {0}")]
    Header(String),
    #[error("csv: {0}")]
    Csv(String),
    #[error("line {line}: expected {expected} cells, found {found}")]
    CellCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: column '{column}' is not valid: '{value}'")]
    InvalidCell {
        line: usize,
        column: String,
        value: String,
    },
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}
