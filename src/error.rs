use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Every way a parse-and-transform run can fail.
///
/// A run either produces a complete model or one of these; nothing partial
/// is returned or cached.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required named array is absent from the container.
    #[error("missing field '{field}' in {container}")]
    MissingField { field: String, container: String },

    /// Two arrays that must agree on a dimension do not.
    #[error("shape mismatch: {what} (expected {expected}, got {actual})")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Two-file mode received a number of containers other than two.
    #[error("expected {expected} container(s), got {actual}")]
    FileCount { expected: usize, actual: usize },

    /// Requested sample size lies outside `[min, max]`.
    #[error("invalid sample size {requested}: must be within [{min}, {max}]")]
    InvalidSampleSize {
        requested: usize,
        min: usize,
        max: usize,
    },

    /// Serial day code does not map to a representable calendar date.
    #[error("day code {0} is outside the representable calendar range")]
    DateRange(String),

    /// The bytes are not a readable MAT v5 container.
    #[error("invalid MAT container {container}: {reason}")]
    InvalidContainer { container: String, reason: String },

    /// Export target extension not recognised.
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    /// Configuration file is unreadable or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl PipelineError {
    pub(crate) fn missing(field: &str, container: &str) -> Self {
        PipelineError::MissingField {
            field: field.to_string(),
            container: container.to_string(),
        }
    }

    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        PipelineError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
