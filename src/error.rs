//! Error types shared by the loaders, the merge pipeline and the exporters.
//!
//! - `DataLoadError`: a source file is missing, unreadable or malformed
//! - `ProcessingError`: a merge/metric/output stage cannot run
//! - `ConfigError`: the configuration file or overrides are invalid
//!
//! Every error aborts the run; there is no partial result.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("source file not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}, record {record}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        path: PathBuf,
        record: usize,
        value: String,
    },

    #[error("{path}, record {record}: invalid number '{value}' in column '{column}'")]
    InvalidNumber {
        path: PathBuf,
        record: usize,
        column: String,
        value: String,
    },

    #[error("{table}: interval {index} ends before it starts")]
    InvalidInterval { table: &'static str, index: usize },

    #[error("{table}: timestamps must be strictly increasing (row {index})")]
    Unordered { table: &'static str, index: usize },
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("No data loaded")]
    NoData,

    #[error("No processed data available")]
    NotProcessed,

    #[error("glucose table is empty, cannot derive a timeline range")]
    EmptyGlucose,

    #[error("column '{column}' has {found} rows, timeline has {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("failed to export merged table: {0}")]
    Export(String),

    #[error("failed to render dashboard: {0}")]
    Render(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid target range {min}..={max}")]
    InvalidTargetRange { min: f64, max: f64 },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
