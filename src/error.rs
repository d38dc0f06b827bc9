use std::path::PathBuf;

use thiserror::Error;

use crate::normalize::schema::CanonicalField;
use crate::types::Category;

/// Convenience result type for file loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised while reading and validating the configuration document.
///
/// All of these are fatal to a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Error type returned by the loader and the per-format readers.
///
/// One enum is shared across CSV/JSON/XML (and optional Excel) reading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The requested source name is not configured. Fatal.
    #[error("unknown data source '{0}'")]
    UnknownSource(String),

    /// The file extension is not one of the supported formats.
    #[error("unsupported file format '{extension}' ({})", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// A location pattern is not a valid glob.
    #[error("invalid location pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The file parsed but does not have a record shape we can flatten.
    #[error("malformed input: {message}")]
    Malformed { message: String },
}

/// A required canonical field has no matching column in a source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{category} source is missing required field {field:?} (looked for '{raw_name}')")]
    MissingField {
        category: Category,
        field: CanonicalField,
        raw_name: String,
    },
}

/// Unit normalization failures. Always per-record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("unrecognized {dimension} unit '{unit}'")]
    Unrecognized { dimension: &'static str, unit: String },

    #[error("quantity {value} is not a finite number")]
    NotFinite { value: f64 },
}

/// Failures of a single call to the estimation service.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Connect/timeout/transport level fault.
    #[error("transport fault: {0}")]
    Transport(String),

    /// Success status but an unusable body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The estimate cannot be stored as a non-negative finite value.
    #[error("estimate {value} is not a non-negative finite number")]
    InvalidEstimate { value: f64 },
}

impl From<reqwest::Error> for EstimationError {
    fn from(err: reqwest::Error) -> Self {
        EstimationError::Transport(err.to_string())
    }
}

/// Errors reading or writing persisted artifacts.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A prerequisite artifact from an earlier stage does not exist.
    #[error("missing prerequisite output file {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error on {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error for pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("failed to start estimation workers: {0}")]
    Execution(#[from] rayon::ThreadPoolBuildError),
}
