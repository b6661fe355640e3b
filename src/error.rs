//! Error types for model loading, input validation, inference and dataset I/O

use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup error: the classifier artifact could not be brought into memory.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("model artifact {} is incompatible: {reason}", path.display())]
    Incompatible { path: PathBuf, reason: String },

    #[error("inference runtime error: {0}")]
    Runtime(String),
}

/// A transaction record that does not satisfy the feature contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not a number: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("field '{field}' must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("'{0}' is not part of the feature contract")]
    UnknownField(String),

    #[error("transaction must be a JSON object")]
    NotAnObject,

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Failure inside the classifier call that is not caused by the input.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("inference backend failed: {0}")]
    Backend(String),

    #[error("model returned unexpected class {0}, expected 0 or 1")]
    UnexpectedClass(i64),

    #[error("model produced no usable output: {0}")]
    MissingOutput(String),

    #[error("model session lock poisoned")]
    Poisoned,
}

/// Either side of a `predict` call failing.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Error loading or splitting a labelled CSV dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}, column '{column}': cannot parse '{value}' as a number")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: invalid record: {source}")]
    InvalidRecord {
        row: usize,
        #[source]
        source: ValidationError,
    },

    #[error("row {row}: label must be 0 or 1, got '{value}'")]
    InvalidLabel { row: usize, value: String },

    #[error("dataset contains no rows")]
    Empty,

    #[error("test size must be between 0 and 1 exclusive, got {0}")]
    InvalidTestSize(f64),

    #[error("class {label} has {count} row(s); stratified splitting needs at least 2")]
    TooFewSamples { label: u8, count: usize },
}
