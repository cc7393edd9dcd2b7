use thiserror::Error;

use crate::types::Kind;

/// Convenience result type used across the crate.
pub type JanitorResult<T> = Result<T, JanitorError>;

/// Error type returned by inference, frame access, transforms, sources and sinks.
///
/// Every error is terminal for the run that produced it; nothing is retried internally.
#[derive(Debug, Error)]
pub enum JanitorError {
    /// The inference sample could not be read or decoded.
    #[error("inference failed: {message}")]
    Inference { message: String },

    /// A strict-mode record had the wrong number of fields.
    #[error("record {line} has wrong field count: expected {expected}, got {actual}")]
    Shape {
        line: u64,
        expected: usize,
        actual: usize,
    },

    /// A cell access named a column that is not in the schema.
    #[error("no such column '{column}'")]
    UnknownColumn { column: String },

    /// A value could not be coerced to a column's [`Kind`].
    #[error("type mismatch for column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: Kind,
        found: String,
    },

    /// A row index was outside `0..rows`.
    #[error("row {row} out of bounds (frame has {rows} rows)")]
    RowOutOfBounds { row: usize, rows: usize },

    /// A validating transform found values outside the declared domain.
    #[error("{step}: {offending} value(s) in column '{column}' {message}")]
    Validation {
        step: String,
        column: String,
        offending: usize,
        message: String,
    },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decode/encode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parquet reader/writer error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Malformed input glob pattern.
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// Directory traversal failure while expanding inputs.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The input does not conform to the expected schema (missing columns, differing files).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A strict-mode value could not be parsed into its column's kind.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A user-supplied regular expression did not compile.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A pipeline step failed; wraps the step's own error. `step` is 1-based.
    #[error("step {step} ({name}) failed: {source}")]
    Step {
        step: usize,
        name: String,
        #[source]
        source: Box<JanitorError>,
    },

    /// The run was cancelled through its [`crate::context::RunContext`].
    #[error("run cancelled")]
    Cancelled,

    /// The run's deadline passed.
    #[error("run deadline exceeded")]
    DeadlineExceeded,

    /// Invalid options, templates or step descriptions.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl JanitorError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`JanitorError::Step`] wrappers.
    pub fn root(&self) -> &JanitorError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}
