//! Error types for the hts_forecast crate

use hts_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the hts_forecast crate
#[derive(Debug, Error)]
pub enum HtsError {
    /// Malformed input: missing columns, unparseable dates, non-numeric sales
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from invalid parameters or configuration
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A per-series forecaster failed
    #[error("Forecasting error for series '{series_id}': {message}")]
    ForecastingError { series_id: String, message: String },

    /// A forecaster failure worth retrying
    #[error("Transient forecasting failure for series '{series_id}': {message}")]
    Transient { series_id: String, message: String },

    /// The reconciliation normal matrix could not be factorised
    #[error("Singular reconciliation matrix at level '{level}': {message}")]
    SingularMatrix { level: String, message: String },

    /// A bottom-level id does not split into the hierarchy columns
    #[error("Cannot split unique_id '{unique_id}' into {expected} components (found {found})")]
    KeySplit {
        unique_id: String,
        expected: usize,
        found: usize,
    },

    /// Error from the numeric kernels
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error reading or writing CSV records
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error reading or writing JSON artifacts
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A pipeline stage failed
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<HtsError>,
    },
}

impl HtsError {
    /// Whether retrying the failed operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, HtsError::Transient { .. })
    }

    /// Attach the name of the pipeline stage that produced this error
    pub fn in_stage(self, stage: &'static str) -> Self {
        HtsError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, HtsError>;

impl From<PolarsError> for HtsError {
    fn from(err: PolarsError) -> Self {
        HtsError::PolarsError(err.to_string())
    }
}
