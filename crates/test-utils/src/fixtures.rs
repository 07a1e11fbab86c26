//! Ready-made grids, projectors and configurations for tests.

use crate::generators::{create_flat_field, create_hill_field};
use dem_common::{BoundingBox, MemoryGrid, Rgba};
use projection::ProjectionKind;
use renderer::{ProjectionOptions, Projector, RenderConfig, RenderMode};
use std::sync::Arc;

/// Bounding boxes used across the test suites.
pub mod bbox {
    use dem_common::BoundingBox;

    /// 10 x 10 degrees anchored at the origin.
    pub fn unit_square() -> BoundingBox {
        BoundingBox::new(10.0, 0.0, 10.0, 0.0)
    }

    /// Alpine extent, wider than tall.
    pub fn alps() -> BoundingBox {
        BoundingBox::new(48.0, 45.0, 12.0, 5.0)
    }
}

/// Terrain colors used by the fixture grids.
pub mod colors {
    use dem_common::Rgba;

    pub const GROUND: Rgba = Rgba::opaque(90, 140, 60);
    pub const BACKGROUND: Rgba = Rgba::TRANSPARENT;
}

/// 11 x 11 grid over [`bbox::unit_square`] at one-degree spacing, all at `elevation`.
pub fn flat_grid(elevation: f64) -> MemoryGrid {
    grid_over_unit_square(create_flat_field(11, 11, elevation))
}

/// 11 x 11 Gaussian hill over [`bbox::unit_square`] peaking at `peak` meters.
pub fn hill_grid(peak: f64) -> MemoryGrid {
    grid_over_unit_square(create_hill_field(11, 11, peak)).with_elevation_range(0.0, peak)
}

/// 11 x 11 grid over [`bbox::unit_square`] from row-major `elevations`.
pub fn grid_over_unit_square(elevations: Vec<f64>) -> MemoryGrid {
    MemoryGrid::new(10.0, 0.0, 1.0, 1.0, 11, elevations)
        .expect("fixture grid is well formed")
        .with_base_color(colors::GROUND)
}

/// Shared handle as taken by the driver.
pub fn shared(grid: MemoryGrid) -> Arc<dyn dem_common::ElevationGrid> {
    Arc::new(grid)
}

/// Equirectangular projector looking straight down on `bounds`.
pub fn top_down_projector(bounds: BoundingBox, width: usize, height: usize) -> Projector {
    projector_with(bounds, width, height, &ProjectionOptions::top_down())
}

/// Equirectangular projector with explicit view options.
///
/// Elevations span 0-1000 m at 1000 m per canvas unit, so relief stays small
/// next to the canvas.
pub fn projector_with(
    bounds: BoundingBox,
    width: usize,
    height: usize,
    options: &ProjectionOptions,
) -> Projector {
    let map = ProjectionKind::Equirectangular
        .build(bounds, width as f64, height as f64)
        .expect("fixture bounds are valid");
    Projector::new(
        map,
        width as f64,
        height as f64,
        (0.0, 1000.0),
        1000.0,
        1.0,
        options,
    )
}

/// Small, fast configuration: 100 x 100 output, 4 tiles over the unit
/// square at one-degree resolution, top-down view.
pub fn test_config(mode: RenderMode) -> RenderConfig {
    RenderConfig {
        width: 100,
        height: 100,
        subpixel_width: 2,
        pixel_stack_depth: 4,
        tile_size: 6,
        background: colors::BACKGROUND,
        mode,
        band_rows: 8,
        idle_poll_ms: 1,
        stop_timeout_ms: 10_000,
        projection: ProjectionOptions::top_down(),
        ..RenderConfig::default()
    }
}

/// Opaque gray of the given level.
pub fn gray(level: u8) -> Rgba {
    Rgba::opaque(level, level, level)
}
