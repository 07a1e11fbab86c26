//! Error types shared by the grid-side collaborators.

use thiserror::Error;

/// Result type alias using DemError.
pub type DemResult<T> = Result<T, DemError>;

/// Errors raised while describing or sampling elevation data.
#[derive(Debug, Error)]
pub enum DemError {
    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("Grid size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for DemError {
    fn from(err: serde_json::Error) -> Self {
        DemError::InvalidConfig(format!("JSON error: {}", err))
    }
}
