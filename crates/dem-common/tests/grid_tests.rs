//! Tests for bounding boxes, model dimensions and in-memory grids.

use dem_common::bbox::BboxParseError;
use dem_common::{
    is_no_data, BoundingBox, DemError, ElevationGrid, LatLonResolution, MemoryGrid,
    ModelDimensions, Rgba, EARTH_MEAN_RADIUS, NO_DATA,
};

fn res(latitude: f64, longitude: f64) -> LatLonResolution {
    LatLonResolution {
        latitude,
        longitude,
    }
}

// ============================================================================
// BoundingBox tests
// ============================================================================

#[test]
fn test_bbox_spans_and_center() {
    let bbox = BoundingBox::new(48.0, 45.0, 12.0, 5.0);
    assert_eq!(bbox.latitude_span(), 3.0);
    assert_eq!(bbox.longitude_span(), 7.0);
    assert_eq!(bbox.center(), (46.5, 8.5));
    assert!(bbox.is_valid());
}

#[test]
fn test_bbox_inverted_is_invalid() {
    assert!(!BoundingBox::new(0.0, 10.0, 10.0, 0.0).is_valid());
    assert!(!BoundingBox::new(10.0, 10.0, 10.0, 0.0).is_valid());
    assert!(!BoundingBox::new(f64::NAN, 0.0, 10.0, 0.0).is_valid());
}

#[test]
fn test_bbox_parse_rejects_inverted() {
    assert!(matches!(
        BoundingBox::from_extent_string("10,0,0,10"),
        Err(BboxParseError::Inverted(_))
    ));
    assert!(matches!(
        BoundingBox::from_extent_string("a,0,10,10"),
        Err(BboxParseError::InvalidNumber(_))
    ));
    assert!(matches!(
        BoundingBox::from_extent_string("0,0,10"),
        Err(BboxParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_bbox_intersection() {
    let a = BoundingBox::new(10.0, 0.0, 10.0, 0.0);
    let b = BoundingBox::new(15.0, 5.0, 15.0, 5.0);
    assert_eq!(a.intersection(&b), Some(BoundingBox::new(10.0, 5.0, 10.0, 5.0)));

    let far = BoundingBox::new(40.0, 30.0, 40.0, 30.0);
    assert_eq!(a.intersection(&far), None);
}

// ============================================================================
// ModelDimensions tests
// ============================================================================

#[test]
fn test_dimensions_keep_aspect_ratio() {
    // twice as wide as tall
    let dims = ModelDimensions::compute(
        BoundingBox::new(10.0, 0.0, 20.0, 0.0),
        res(0.5, 0.5),
        1000,
        1000,
        10,
    )
    .unwrap();
    assert_eq!((dims.data_columns, dims.data_rows), (40, 20));
    assert_eq!((dims.output_width, dims.output_height), (1000, 500));
    assert_eq!(dims.tile_size, 10);
}

#[test]
fn test_output_resolution_scales_with_output() {
    let dims = ModelDimensions::compute(
        BoundingBox::new(10.0, 0.0, 10.0, 0.0),
        res(0.125, 0.125),
        100,
        100,
        100,
    )
    .unwrap();
    // 80 data rows stretched over 100 output rows
    assert!((dims.output_resolution.latitude - 0.1).abs() < 1e-12);

    let meters = dims.output_meters_resolution(EARTH_MEAN_RADIUS);
    assert!((meters - 11_119.5).abs() < 1.0, "got {}", meters);
}

#[test]
fn test_dimensions_reject_bad_input() {
    let bbox = BoundingBox::new(10.0, 0.0, 10.0, 0.0);
    assert!(matches!(
        ModelDimensions::compute(bbox, res(0.0, 1.0), 100, 100, 10),
        Err(DemError::InvalidResolution(_))
    ));
    assert!(ModelDimensions::compute(bbox, res(1.0, 1.0), 0, 100, 10).is_err());
}

// ============================================================================
// MemoryGrid tests
// ============================================================================

#[test]
fn test_grid_lookup_snaps_to_nearest_point() {
    // 3 x 3 grid, north-west corner at (2, 0)
    let grid = MemoryGrid::new(2.0, 0.0, 1.0, 1.0, 3, (0..9).map(f64::from).collect()).unwrap();
    assert_eq!(grid.elevation_at(2.0, 0.0), 0.0);
    assert_eq!(grid.elevation_at(1.0, 1.0), 4.0);
    assert_eq!(grid.elevation_at(0.1, 1.9), 8.0);
    assert_eq!(grid.elevation_at(-1.0, 0.0), NO_DATA);
    assert!(is_no_data(grid.elevation_at(-1.0, 0.0)));
    assert!(!is_no_data(grid.elevation_at(2.0, 0.0)));
    assert_eq!(grid.bounds(), BoundingBox::new(2.0, 0.0, 2.0, 0.0));
    assert_eq!(grid.elevation_range(), (0.0, 8.0));
}

#[test]
fn test_grid_range_ignores_missing_values() {
    let grid = MemoryGrid::new(1.0, 0.0, 1.0, 1.0, 2, vec![NO_DATA, 5.0, 7.0, NO_DATA]).unwrap();
    assert_eq!(grid.elevation_range(), (5.0, 7.0));
}

#[test]
fn test_grid_colors() {
    let red = Rgba::opaque(255, 0, 0);
    let grid = MemoryGrid::new(1.0, 0.0, 1.0, 1.0, 2, vec![0.0; 4])
        .unwrap()
        .with_base_color(red);
    assert_eq!(grid.color_at(0.0, 0.0), red);

    let colors = vec![Rgba::BLACK, Rgba::WHITE, Rgba::BLACK, Rgba::WHITE];
    let grid = grid.with_colors(colors).unwrap();
    assert_eq!(grid.color_at(1.0, 1.0), Rgba::WHITE);
    // outside the grid falls back to the base color
    assert_eq!(grid.color_at(5.0, 5.0), red);
}

#[test]
fn test_grid_rejects_ragged_rows() {
    assert!(matches!(
        MemoryGrid::new(1.0, 0.0, 1.0, 1.0, 3, vec![0.0; 4]),
        Err(DemError::SizeMismatch { .. })
    ));
    assert!(MemoryGrid::new(1.0, 0.0, 0.0, 1.0, 2, vec![0.0; 4]).is_err());
}
