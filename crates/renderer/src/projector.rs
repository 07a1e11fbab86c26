//! Geographic to screen-space projection.
//!
//! A point goes through the 2-D map projection, has its elevation recentred
//! and scaled into canvas units, is rotated (yaw, then pitch), shifted and
//! zoomed, and finally perspective-divided against a fixed camera and eye.
//! The result is a canvas `(x, y)` plus a depth where greater is nearer.

use crate::config::ProjectionOptions;
use crate::error::Result;
use crate::geometry::Vertex;
use dem_common::{LatLonResolution, ModelDimensions, Rgba, EARTH_MEAN_RADIUS};
use nalgebra::{Rotation3, Vector3};
use projection::MapProjection;

/// Canvas position and depth of a projected point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub struct Projector {
    map: Box<dyn MapProjection>,
    width: f64,
    height: f64,
    /// Midpoint of the declared elevation range.
    mid_elevation: f64,
    /// Meters per canvas unit.
    resolution: f64,
    elevation_multiple: f64,
    rotation: Rotation3<f64>,
    shift: Vector3<f64>,
    zoom: f64,
    camera: Vector3<f64>,
    eye: Vector3<f64>,
    /// Camera orientation (x, y, z) in degrees. Held but not applied.
    orientation: [f64; 3],
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("map", &self.map.name())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mid_elevation", &self.mid_elevation)
            .field("resolution", &self.resolution)
            .field("zoom", &self.zoom)
            .finish_non_exhaustive()
    }
}

impl Projector {
    /// Build a projector for a `width` x `height` canvas.
    ///
    /// `elevation_range` is the data's declared (min, max); `resolution` is
    /// the ground distance in meters of one canvas unit.
    pub fn new(
        map: Box<dyn MapProjection>,
        width: f64,
        height: f64,
        elevation_range: (f64, f64),
        resolution: f64,
        elevation_multiple: f64,
        options: &ProjectionOptions,
    ) -> Self {
        let (min, max) = elevation_range;
        let resolution = if resolution.is_nan() || resolution == 0.0 {
            1.0
        } else {
            resolution
        };

        let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), options.rotate_y.to_radians());
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), options.rotate_x.to_radians());

        let mut min_side = width.min(height) - 20.0;
        if min_side <= 0.0 {
            min_side = width.min(height);
        }

        Self {
            map,
            width,
            height,
            mid_elevation: (max + min) / 2.0,
            resolution,
            elevation_multiple,
            rotation: pitch * yaw,
            shift: Vector3::new(options.shift_x * width, options.shift_y * height, 0.0),
            zoom: options.zoom,
            camera: Vector3::new(0.0, 0.0, min_side),
            eye: Vector3::new(0.0, 0.0, min_side / 2.0),
            orientation: options.camera_orientation,
        }
    }

    /// Build a projector from model dimensions, using the output size as the
    /// canvas and the Earth's mean radius for the meters resolution.
    pub fn for_model(
        map: Box<dyn MapProjection>,
        dims: &ModelDimensions,
        elevation_range: (f64, f64),
        elevation_multiple: f64,
        options: &ProjectionOptions,
    ) -> Self {
        Self::new(
            map,
            dims.output_width as f64,
            dims.output_height as f64,
            elevation_range,
            dims.output_meters_resolution(EARTH_MEAN_RADIUS),
            elevation_multiple,
            options,
        )
    }

    /// Output sampling resolution for a desired output size.
    pub fn calculate_output_resolutions(
        output_width: f64,
        output_height: f64,
        data_columns: f64,
        data_rows: f64,
        resolution: LatLonResolution,
    ) -> LatLonResolution {
        ModelDimensions::calculate_output_resolutions(
            output_width,
            output_height,
            data_columns,
            data_rows,
            resolution,
        )
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn camera_orientation(&self) -> [f64; 3] {
        self.orientation
    }

    /// Project a geographic point with elevation onto the canvas.
    pub fn project(&self, latitude: f64, longitude: f64, elevation: f64) -> Result<ScreenPoint> {
        let planar = self.map.project(latitude, longitude)?;

        let elev =
            (elevation - self.mid_elevation) * self.elevation_multiple / self.resolution;

        let mut v = Vector3::new(
            planar.column - self.width / 2.0,
            elev,
            planar.row - self.height / 2.0,
        );
        v = self.rotation * v;
        v += self.shift;
        v *= self.zoom;

        let v = self.perspective(v);

        Ok(ScreenPoint {
            x: -v.x + self.width / 2.0,
            y: v.y + self.height / 2.0,
            z: v.z,
        })
    }

    /// Project and attach a color.
    pub fn vertex(&self, latitude: f64, longitude: f64, elevation: f64, color: Rgba) -> Result<Vertex> {
        let p = self.project(latitude, longitude, elevation)?;
        Ok(Vertex::new(p.x, p.y, p.z, color))
    }

    fn perspective(&self, a: Vector3<f64>) -> Vector3<f64> {
        let (c, e) = (&self.camera, &self.eye);

        // Camera orientation fixed at identity.
        let (sin_x, sin_y, sin_z) = (0.0, 0.0, 0.0);
        let (cos_x, cos_y, cos_z) = (1.0, 1.0, 1.0);

        let (ax, ay, az) = (a.x - c.x, a.y - c.y, a.z - c.z);
        let d_x = cos_y * (sin_z * ay + cos_z * ax) - sin_y * az;
        let d_y = sin_x * (cos_y * az + sin_y * (sin_z * ay + cos_z * ax))
            + cos_x * (cos_z * ay - sin_z * ax);
        let d_z = cos_x * (cos_y * az + sin_y * (sin_z * ay + cos_z * ax))
            - sin_x * (cos_z * ay - sin_z * ax);

        let factor = if d_z == 0.0 { 1.0 } else { e.z / d_z };

        Vector3::new((d_x - e.x) * factor, (d_y - e.y) * factor, (d_z - e.z) * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dem_common::BoundingBox;
    use projection::Equirectangular;

    fn projector(options: ProjectionOptions) -> Projector {
        let map = Equirectangular::new(BoundingBox::new(10.0, 0.0, 10.0, 0.0), 200.0, 100.0).unwrap();
        Projector::new(Box::new(map), 200.0, 100.0, (0.0, 1000.0), 50.0, 1.0, &options)
    }

    #[test]
    fn test_center_projects_to_center() {
        let p = projector(ProjectionOptions::flat()).project(5.0, 5.0, 500.0).unwrap();
        assert!((p.x - 100.0).abs() < 1e-9);
        assert!((p.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_higher_points_are_nearer_when_tilted() {
        let proj = projector(ProjectionOptions::default());
        let low = proj.project(5.0, 5.0, 0.0).unwrap();
        let high = proj.project(5.0, 5.0, 1000.0).unwrap();
        assert!(high.z > low.z);
    }

    #[test]
    fn test_top_down_view_keeps_map_orientation() {
        let proj = projector(ProjectionOptions::top_down());
        let west = proj.project(5.0, 2.0, 500.0).unwrap();
        let east = proj.project(5.0, 8.0, 500.0).unwrap();
        assert!(west.x < east.x);
        let north = proj.project(8.0, 5.0, 500.0).unwrap();
        let south = proj.project(2.0, 5.0, 500.0).unwrap();
        assert!(north.y < south.y);
    }

    #[test]
    fn test_zero_depth_does_not_divide() {
        // A point sitting exactly on the camera plane keeps a finite position.
        let proj = projector(ProjectionOptions::flat());
        let v = proj.perspective(Vector3::new(3.0, 4.0, proj.camera.z));
        assert!(v.x.is_finite() && v.y.is_finite() && v.z.is_finite());
    }

    #[test]
    fn test_projection_domain_error() {
        let proj = projector(ProjectionOptions::flat());
        assert!(proj.project(95.0, 5.0, 0.0).is_err());
    }
}
