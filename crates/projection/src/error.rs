//! Projection errors.

use thiserror::Error;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// The coordinate is outside the projection's valid domain.
    #[error("coordinate ({latitude}, {longitude}) is outside the projection domain")]
    OutOfDomain { latitude: f64, longitude: f64 },

    /// The projection cannot be built for this extent or canvas size.
    #[error("invalid projection extent: {0}")]
    InvalidExtent(String),
}

impl ProjectionError {
    pub fn invalid_extent(msg: impl Into<String>) -> Self {
        Self::InvalidExtent(msg.into())
    }
}
