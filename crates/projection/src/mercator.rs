//! Spherical Mercator projection fitted to an extent.

use crate::{check_domain, MapPoint, MapProjection, ProjectionError, ProjectionResult};
use dem_common::BoundingBox;
use std::f64::consts::PI;

/// Latitude limit beyond which Mercator is not defined here.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

#[derive(Debug, Clone)]
pub struct Mercator {
    bounds: BoundingBox,
    width: f64,
    height: f64,
    y_north: f64,
    y_south: f64,
}

/// Unscaled Mercator northing for a latitude in degrees.
fn mercator_y(latitude: f64) -> f64 {
    let phi = latitude.to_radians();
    (PI / 4.0 + phi / 2.0).tan().ln()
}

impl Mercator {
    pub fn new(bounds: BoundingBox, width: f64, height: f64) -> ProjectionResult<Self> {
        if !bounds.is_valid() || bounds.north > MAX_LATITUDE || bounds.south < -MAX_LATITUDE {
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
            y_north: mercator_y(bounds.north),
            y_south: mercator_y(bounds.south),
        })
    }
}

impl MapProjection for Mercator {
    fn project(&self, latitude: f64, longitude: f64) -> ProjectionResult<MapPoint> {
        check_domain(latitude, longitude)?;
        if latitude.abs() > MAX_LATITUDE {
            return Err(ProjectionError::OutOfDomain {
                latitude,
                longitude,
            });
        }

        let column = (longitude - self.bounds.west) / self.bounds.longitude_span() * self.width;
        let row = (self.y_north - mercator_y(latitude)) / (self.y_north - self.y_south) * self.height;

        Ok(MapPoint { column, row })
    }

    fn name(&self) -> &'static str {
        "mercator"
    }
}
