//! 2-D map projections from geographic coordinates to canvas columns/rows.
//!
//! Implements map projections from scratch without external dependencies.
//! The renderer treats these as a pluggable collaborator through
//! [`MapProjection`].

pub mod equirectangular;
pub mod error;
pub mod mercator;

pub use equirectangular::Equirectangular;
pub use error::{ProjectionError, ProjectionResult};
pub use mercator::Mercator;

use serde::{Deserialize, Serialize};

/// A projected point on the canvas plane.
///
/// `column` grows eastward and `row` grows southward, both in output pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub column: f64,
    pub row: f64,
}

/// Maps (latitude, longitude) in degrees onto the canvas plane.
pub trait MapProjection: Send + Sync {
    /// Project a coordinate, failing when it lies outside the projection's domain.
    fn project(&self, latitude: f64, longitude: f64) -> ProjectionResult<MapPoint>;

    /// Short identifier used in logs and configuration.
    fn name(&self) -> &'static str;
}

/// Which built-in projection to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Equirectangular,
    Mercator,
}

impl ProjectionKind {
    /// Parse from string (case-insensitive), defaulting to equirectangular.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mercator" => Self::Mercator,
            _ => Self::Equirectangular,
        }
    }

    /// Build the projection for an extent rendered at `width` x `height`.
    pub fn build(
        self,
        bounds: dem_common::BoundingBox,
        width: f64,
        height: f64,
    ) -> ProjectionResult<Box<dyn MapProjection>> {
        Ok(match self {
            Self::Equirectangular => Box::new(Equirectangular::new(bounds, width, height)?),
            Self::Mercator => Box::new(Mercator::new(bounds, width, height)?),
        })
    }
}

/// Shared domain check for geographic input.
pub(crate) fn check_domain(latitude: f64, longitude: f64) -> ProjectionResult<()> {
    if !latitude.is_finite()
        || !longitude.is_finite()
        || !(-90.0..=90.0).contains(&latitude)
        || !(-180.0..=180.0).contains(&longitude)
    {
        return Err(ProjectionError::OutOfDomain {
            latitude,
            longitude,
        });
    }
    Ok(())
}
