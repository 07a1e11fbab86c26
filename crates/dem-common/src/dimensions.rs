//! Model dimensions: data size, output size and sampling resolutions.

use crate::{BoundingBox, DemError, DemResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean radius of the Earth in meters.
pub const EARTH_MEAN_RADIUS: f64 = 6_371_008.8;

/// A latitude/longitude sampling resolution in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonResolution {
    pub latitude: f64,
    pub longitude: f64,
}

/// Size of the source data and of the rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDimensions {
    pub bounds: BoundingBox,
    /// Native data resolution.
    pub resolution: LatLonResolution,
    /// Resolution at which the output is sampled.
    pub output_resolution: LatLonResolution,
    pub data_rows: usize,
    pub data_columns: usize,
    pub output_width: usize,
    pub output_height: usize,
    /// Grid points per tile side; the tile layout itself lives with the renderer.
    pub tile_size: usize,
}

impl ModelDimensions {
    /// Compute dimensions for rendering `bounds` at the requested output size.
    ///
    /// The output keeps the data's aspect ratio: the longer data axis keeps the
    /// requested size and the shorter one shrinks to match.
    pub fn compute(
        bounds: BoundingBox,
        resolution: LatLonResolution,
        width: usize,
        height: usize,
        tile_size: usize,
    ) -> DemResult<Self> {
        if !bounds.is_valid() {
            return Err(DemError::InvalidExtent(format!("{:?}", bounds)));
        }
        if !(resolution.latitude > 0.0 && resolution.longitude > 0.0) {
            return Err(DemError::InvalidResolution(format!("{:?}", resolution)));
        }
        if width == 0 || height == 0 || tile_size == 0 {
            return Err(DemError::InvalidConfig(format!(
                "width={}, height={}, tile_size={}",
                width, height, tile_size
            )));
        }

        let data_rows = (bounds.latitude_span() / resolution.latitude).ceil().max(1.0) as usize;
        let data_columns = (bounds.longitude_span() / resolution.longitude).ceil().max(1.0) as usize;

        let (mut output_width, mut output_height) = (width, height);
        if data_rows > data_columns {
            let ratio = data_columns as f64 / data_rows as f64;
            output_width = ((height as f64 * ratio).round() as usize).max(1);
        } else if data_columns > data_rows {
            let ratio = data_rows as f64 / data_columns as f64;
            output_height = ((width as f64 * ratio).round() as usize).max(1);
        }

        let output_resolution = Self::calculate_output_resolutions(
            output_width as f64,
            output_height as f64,
            data_columns as f64,
            data_rows as f64,
            resolution,
        );

        Ok(Self {
            bounds,
            resolution,
            output_resolution,
            data_rows,
            data_columns,
            output_width,
            output_height,
            tile_size,
        })
    }

    /// Output sampling resolution for a desired output size: the native
    /// resolution divided by the output-to-data size ratio on each axis.
    pub fn calculate_output_resolutions(
        output_width: f64,
        output_height: f64,
        data_columns: f64,
        data_rows: f64,
        resolution: LatLonResolution,
    ) -> LatLonResolution {
        let x_ratio = output_width / data_columns;
        let y_ratio = output_height / data_rows;

        LatLonResolution {
            latitude: resolution.latitude / y_ratio,
            longitude: resolution.longitude / x_ratio,
        }
    }

    /// Ground distance in meters covered by one native latitude step.
    pub fn meters_resolution(&self, mean_radius: f64) -> f64 {
        let meters_per_degree = 2.0 * PI * mean_radius / 360.0;
        self.resolution.latitude * meters_per_degree
    }

    /// Meters per output row; falls back to 1.0 when undefined.
    pub fn output_meters_resolution(&self, mean_radius: f64) -> f64 {
        let ratio = self.resolution.latitude / self.output_resolution.latitude;
        let resolution = self.meters_resolution(mean_radius) / ratio;
        if resolution.is_nan() || resolution == 0.0 {
            1.0
        } else {
            resolution
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(v: f64) -> LatLonResolution {
        LatLonResolution {
            latitude: v,
            longitude: v,
        }
    }

    #[test]
    fn test_square_dimensions() {
        let dims =
            ModelDimensions::compute(BoundingBox::new(10.0, 0.0, 10.0, 0.0), res(0.5), 40, 40, 10)
                .unwrap();
        assert_eq!(dims.data_rows, 20);
        assert_eq!(dims.data_columns, 20);
        assert_eq!((dims.output_width, dims.output_height), (40, 40));
        assert_eq!(dims.tile_size, 10);
        assert!((dims.output_resolution.latitude - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_wide_extent_shrinks_height() {
        let dims =
            ModelDimensions::compute(BoundingBox::new(5.0, 0.0, 10.0, 0.0), res(0.5), 400, 400, 100)
                .unwrap();
        assert_eq!(dims.output_width, 400);
        assert_eq!(dims.output_height, 200);
    }

    #[test]
    fn test_output_resolution_helper() {
        let r = ModelDimensions::calculate_output_resolutions(100.0, 50.0, 200.0, 200.0, res(1.0));
        assert_eq!(r.longitude, 2.0);
        assert_eq!(r.latitude, 4.0);
    }

    #[test]
    fn test_meters_resolution() {
        let dims =
            ModelDimensions::compute(BoundingBox::new(1.0, 0.0, 1.0, 0.0), res(1.0), 10, 10, 10)
                .unwrap();
        let m = dims.meters_resolution(EARTH_MEAN_RADIUS);
        assert!((m - 111_195.0).abs() < 1.0);
    }

    #[test]
    fn test_invalid_extent_rejected() {
        assert!(
            ModelDimensions::compute(BoundingBox::new(0.0, 10.0, 10.0, 0.0), res(1.0), 10, 10, 10)
                .is_err()
        );
    }
}
