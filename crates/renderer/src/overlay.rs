//! Base grid drawn under the terrain.

use crate::work::{Shape, ShapeFillJob};
use dem_common::{BoundingBox, GeoPoint, Rgba};

/// Latitude bands in the base grid.
pub const BASE_GRID_STRIPS: usize = 10;

/// Longitude bands in the base grid.
pub const BASE_GRID_SLICES: usize = 20;

pub const BASE_GRID_COLOR: Rgba = Rgba::opaque(192, 192, 192);

/// How far below the lowest terrain the grid sits, in meters.
const BASE_GRID_DROP: f64 = 10.0;

/// Graticule over `bounds` as polylines just below `min_elevation`.
///
/// One polyline per parallel (`BASE_GRID_STRIPS + 1`) and per meridian
/// (`BASE_GRID_SLICES + 1`).
pub fn base_grid(bounds: &BoundingBox, min_elevation: f64) -> Vec<ShapeFillJob> {
    let elevation = min_elevation - BASE_GRID_DROP;
    let strip_step = bounds.latitude_span() / BASE_GRID_STRIPS as f64;
    let slice_step = bounds.longitude_span() / BASE_GRID_SLICES as f64;

    let latitude = |i: usize| bounds.south + i as f64 * strip_step;
    let longitude = |j: usize| bounds.west + j as f64 * slice_step;

    let parallels = (0..=BASE_GRID_STRIPS).map(|i| {
        (0..=BASE_GRID_SLICES)
            .map(|j| GeoPoint::new(latitude(i), longitude(j), elevation))
            .collect::<Vec<_>>()
    });
    let meridians = (0..=BASE_GRID_SLICES).map(|j| {
        (0..=BASE_GRID_STRIPS)
            .map(|i| GeoPoint::new(latitude(i), longitude(j), elevation))
            .collect::<Vec<_>>()
    });

    parallels
        .chain(meridians)
        .map(|points| ShapeFillJob {
            shape: Shape::Polyline { points },
            color: BASE_GRID_COLOR,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_grid_lines() {
        let jobs = base_grid(&BoundingBox::new(10.0, 0.0, 20.0, 0.0), 100.0);
        assert_eq!(jobs.len(), BASE_GRID_STRIPS + 1 + BASE_GRID_SLICES + 1);

        let Shape::Polyline { points } = &jobs[0].shape else {
            panic!("expected a polyline");
        };
        assert_eq!(points.len(), BASE_GRID_SLICES + 1);
        assert_eq!(points[0], GeoPoint::new(0.0, 0.0, 90.0));
        assert_eq!(points[BASE_GRID_SLICES].longitude, 20.0);
        assert!(jobs.iter().all(|j| j.color == BASE_GRID_COLOR));
    }
}
