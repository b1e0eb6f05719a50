use std::path::PathBuf;

use crate::data_handling::Column;

pub type Result<T, E = FlipperError> = std::result::Result<T, E>;

/// Errors raised by the analysis stages. Every variant is terminal for a run.
#[derive(Debug, thiserror::Error)]
pub enum FlipperError {
    /// Returned when the source dataset cannot be opened or read.
    #[error("dataset unavailable at {path}")]
    DataUnavailable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Returned when a required column is absent from the source header.
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    /// Returned when a field cannot be parsed. `row` is 1-based, header excluded.
    #[error("malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    /// Returned when a stage receives a dataset lacking an expected column.
    #[error("schema mismatch: expected column {expected:?}, schema is {found:?}")]
    SchemaMismatch { expected: Column, found: Vec<Column> },

    /// Returned when a feature value required by a model is missing.
    #[error("missing value for {column:?} at row {row}")]
    MissingValue { row: usize, column: Column },

    /// Returned when a categorical level was not seen while fitting the encoder.
    #[error("unknown level '{level}' for {column:?}")]
    UnknownLevel { column: Column, level: String },

    #[error("dataset has zero records")]
    EmptyDataset,

    /// Returned when a class has too few records to stratify.
    #[error("cannot stratify split: {reason}")]
    DegenerateSplit { reason: String },

    /// Returned when no bootstrap sample could be evaluated.
    #[error("all {n_samples} bootstrap samples were degenerate for model '{model}'")]
    DegenerateResample { model: String, n_samples: usize },

    #[error("failed to fit model '{model}': {reason}")]
    ModelFit { model: String, reason: String },

    #[error("metric undefined: {reason}")]
    UndefinedMetric { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Returned when writing the report or metric outputs fails.
    #[error("failed to write {path}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
