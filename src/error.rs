//! Error types for the lasso sweep

use thiserror::Error;

/// Result type alias for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Main error type for the sweep
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid train fraction: {0} (must lie strictly between 0 and 1)")]
    InvalidFraction(f64),

    #[error("Invalid fold count: k = {k} for {n_rows} rows (need 2 <= k <= rows)")]
    InvalidFoldCount { k: usize, n_rows: usize },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Fit did not converge for penalty {penalty} after {iterations} iterations")]
    FitConvergence { penalty: f64, iterations: usize },

    #[error("No valid folds for grid point {index} (penalty {penalty})")]
    NoValidFolds { index: usize, penalty: f64 },

    #[error("No valid grid points: all {0} candidates were excluded")]
    NoValidGridPoints(usize),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SweepError {
    /// Whether this error only invalidates a single fit, as opposed to the whole sweep.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SweepError::FitConvergence { .. }
                | SweepError::NoValidFolds { .. }
                | SweepError::DataError(_)
        )
    }
}

impl From<polars::error::PolarsError> for SweepError {
    fn from(err: polars::error::PolarsError) -> Self {
        SweepError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::SerializationError(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for SweepError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        SweepError::ThreadPoolError(err.to_string())
    }
}
