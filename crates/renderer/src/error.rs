//! Error types for rendering.

use crate::stage::StageState;
use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur while rendering a model.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A coordinate fell outside the map projection's domain.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// A fragment or depth write resolved outside the allocated samples.
    #[error("write at ({x}, {y}) is outside the buffer")]
    OutOfBounds { x: f64, y: f64 },

    /// A buffer could not be allocated.
    #[error("failed to allocate {bytes} bytes for render buffers")]
    ResourceExhausted { bytes: usize },

    /// A work item failed inside a pipeline stage.
    #[error("stage '{stage}' failed on a work item: {message}")]
    StageFault { stage: &'static str, message: String },

    /// Stages did not complete within the stop timeout.
    #[error("pipeline stages still running after {waited_ms} ms")]
    StageHang { waited_ms: u64 },

    /// A stage lifecycle change that the state machine does not allow.
    #[error("invalid stage transition from {from:?} to {to:?}")]
    InvalidTransition { from: StageState, to: StageState },

    /// Invalid render configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("PNG encoding failed: {0}")]
    Png(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn stage_fault(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::StageFault {
            stage,
            message: msg.into(),
        }
    }
}

impl From<dem_common::DemError> for RenderError {
    fn from(err: dem_common::DemError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {}", err))
    }
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
