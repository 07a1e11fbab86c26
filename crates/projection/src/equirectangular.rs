//! Equirectangular (plate carrée) projection.
//!
//! Latitude and longitude map linearly onto rows and columns, so the
//! extent's north-west corner lands on (0, 0) and the south-east corner on
//! (width, height).

use crate::{check_domain, MapPoint, MapProjection, ProjectionError, ProjectionResult};
use dem_common::BoundingBox;

#[derive(Debug, Clone)]
pub struct Equirectangular {
    bounds: BoundingBox,
    width: f64,
    height: f64,
}

impl Equirectangular {
    pub fn new(bounds: BoundingBox, width: f64, height: f64) -> ProjectionResult<Self> {
        if !bounds.is_valid() {
            return Err(ProjectionError::invalid_extent(format!("{:?}", bounds)));
        }
        if !(width > 0.0 && height > 0.0) {
            return Err(ProjectionError::invalid_extent(format!(
                "canvas {} x {}",
                width, height
            )));
        }
        Ok(Self {
            bounds,
            width,
            height,
        })
    }
}

impl MapProjection for Equirectangular {
    fn project(&self, latitude: f64, longitude: f64) -> ProjectionResult<MapPoint> {
        check_domain(latitude, longitude)?;

        let column = (longitude - self.bounds.west) / self.bounds.longitude_span() * self.width;
        let row = (self.bounds.north - latitude) / self.bounds.latitude_span() * self.height;

        Ok(MapPoint { column, row })
    }

    fn name(&self) -> &'static str {
        "equirectangular"
    }
}
