//! End-to-end tests for the tile driver.
//!
//! Renders the 11 x 11 fixture grids over a 10 x 10 degree box split into
//! four tiles, in both direct and pipelined mode.

use dem_common::{GeoPoint, LatLonResolution, Rgba};
use projection::{Equirectangular, MapPoint, MapProjection, ProjectionError, ProjectionResult};
use renderer::{
    Canvas, Pipeline, PipelineOrchestrator, ProjectionOptions, Projector, RenderConfig,
    RenderContext, RenderError, RenderMode, Shape, ShapeFillJob, StageState, TileDriver, TileJob,
    TileLayout, WorkHandler, WorkKind,
};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_utils::{
    assert_coords_approx_eq, bbox, flat_grid, hill_grid, shared, test_config, top_down_projector,
};

// ============================================================================
// Helper functions
// ============================================================================

fn driver(config: RenderConfig) -> TileDriver {
    TileDriver::new(config, shared(hill_grid(800.0)))
}

/// Attach a listener that records every reported fraction.
fn record_progress(driver: &mut TileDriver) -> Arc<Mutex<Vec<f64>>> {
    let fractions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fractions);
    driver.add_listener(move |_canvas: &Canvas, fraction: f64| {
        sink.lock().unwrap().push(fraction);
    });
    fractions
}

fn triangle_shape() -> ShapeFillJob {
    ShapeFillJob {
        shape: Shape::Polygon {
            rings: vec![vec![
                GeoPoint::new(9.0, 1.0, 900.0),
                GeoPoint::new(9.0, 4.0, 900.0),
                GeoPoint::new(6.0, 1.0, 900.0),
            ]],
        },
        color: Rgba::opaque(255, 0, 0),
    }
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_layout_has_four_tiles() {
    let driver = driver(test_config(RenderMode::Direct));
    let layout = driver.tile_layout();
    assert_eq!(layout.tile_count(), 4);

    let dims = driver.dimensions().unwrap();
    assert_eq!((dims.output_width, dims.output_height), (100, 100));
}

#[test]
fn test_projector_maps_center_to_canvas_center() {
    let projector = top_down_projector(bbox::unit_square(), 100, 100);
    let p = projector.project(5.0, 5.0, 500.0).unwrap();
    assert_coords_approx_eq!((p.x, p.y), (50.0, 50.0), 1e-9);
}

// ============================================================================
// Rendering
// ============================================================================

fn check_full_render(mode: RenderMode) {
    let mut driver = driver(test_config(mode));
    let fractions = record_progress(&mut driver);

    let output = driver.render().unwrap();
    let report = &output.report;

    assert_eq!(report.mode, mode.as_str());
    assert_eq!((output.image.width, output.image.height), (100, 100));
    assert_eq!(report.tile_count, 4);
    assert_eq!(report.tiles_submitted, 4);
    assert_eq!(report.tiles_built, 4);
    assert_eq!(report.failed_tiles, 0);
    // five grid rows per tile
    assert_eq!(report.strips, 20);
    assert_eq!(report.dropped_fragments, 0);
    assert!(!report.cancelled);

    let fractions = fractions.lock().unwrap();
    assert_eq!(*fractions, vec![0.25, 0.5, 0.75, 1.0]);

    // The terrain sits in the middle of the canvas.
    assert!(output.image.get(50, 50).unwrap() >> 24 != 0);
    assert_eq!(output.image.get(2, 2), Some(Rgba::TRANSPARENT.to_argb()));
    assert!(output.image.covered_pixels() > 1000);
}

#[test]
fn test_direct_render() {
    check_full_render(RenderMode::Direct);
}

#[test]
fn test_pipelined_render() {
    check_full_render(RenderMode::Pipelined);
}

#[test]
fn test_pipelined_stages_all_complete() {
    let output = driver(test_config(RenderMode::Pipelined)).render().unwrap();
    let stages = &output.report.stages;
    assert_eq!(stages.len(), 4);
    assert!(stages.iter().all(|s| s.state == StageState::Completed));
    assert!(stages.iter().all(|s| s.faults == 0));
    let processed: u64 = stages.iter().map(|s| s.processed).sum();
    assert_eq!(processed, 4 + 20);
}

#[test]
fn test_modes_produce_the_same_image() {
    let direct = TileDriver::new(test_config(RenderMode::Direct), shared(flat_grid(300.0)))
        .render()
        .unwrap();
    let pipelined = TileDriver::new(test_config(RenderMode::Pipelined), shared(flat_grid(300.0)))
        .render()
        .unwrap();
    assert_eq!(direct.image, pipelined.image);
}

#[test]
fn test_shapes_and_base_grid_are_drawn() {
    for mode in [RenderMode::Direct, RenderMode::Pipelined] {
        let config = RenderConfig {
            paint_base_grid: true,
            ..test_config(mode)
        };
        let mut driver = driver(config);
        driver.add_shape(triangle_shape());

        let report = driver.render().unwrap().report;
        // 11 parallels, 21 meridians and the triangle
        assert_eq!(report.shapes, 33, "mode {}", mode);
    }
}

#[test]
fn test_shape_above_terrain_is_visible() {
    let mut driver = TileDriver::new(test_config(RenderMode::Direct), shared(flat_grid(0.0)));
    driver.add_shape(triangle_shape());
    let image = driver.render().unwrap().image;

    // lat 8.5, lon 1.5 lies inside the triangle: x = 25 + 1.5 * 5, y = 25 + 1.5 * 5
    let inside = Rgba::from_argb(image.get(32, 32).unwrap());
    assert_eq!(inside, Rgba::opaque(255, 0, 0));
}

// ============================================================================
// Control
// ============================================================================

#[test]
fn test_cancel_before_render_submits_nothing() {
    for mode in [RenderMode::Direct, RenderMode::Pipelined] {
        let mut driver = driver(test_config(mode));
        let fractions = record_progress(&mut driver);
        driver.handle().cancel();

        let report = driver.render().unwrap().report;
        assert!(report.cancelled);
        assert_eq!(report.tiles_submitted, 0);
        assert!(fractions.lock().unwrap().is_empty());
    }
}

#[test]
fn test_pause_holds_the_render_until_resumed() {
    let driver = driver(test_config(RenderMode::Pipelined));
    let handle = driver.handle();
    handle.pause();
    assert!(handle.is_paused());

    let resumer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(60));
        handle.resume();
    });

    let report = driver.render().unwrap().report;
    resumer.join().unwrap();

    assert!(report.elapsed_ms >= 50);
    assert_eq!(report.tiles_built, 4);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = RenderConfig {
        subpixel_width: 0,
        ..test_config(RenderMode::Direct)
    };
    assert!(matches!(driver(config).render(), Err(RenderError::Config(_))));
}

// ============================================================================
// Projection failures
// ============================================================================

/// Equirectangular over the unit square that has no domain east of 5 degrees.
struct WestHalf(Equirectangular);

impl MapProjection for WestHalf {
    fn project(&self, latitude: f64, longitude: f64) -> ProjectionResult<MapPoint> {
        if longitude > 5.0 {
            return Err(ProjectionError::OutOfDomain {
                latitude,
                longitude,
            });
        }
        self.0.project(latitude, longitude)
    }

    fn name(&self) -> &'static str {
        "west-half"
    }
}

fn west_half_context() -> Arc<RenderContext> {
    let map = WestHalf(Equirectangular::new(bbox::unit_square(), 100.0, 100.0).unwrap());
    let projector = Projector::new(
        Box::new(map),
        100.0,
        100.0,
        (0.0, 1000.0),
        1000.0,
        1.0,
        &ProjectionOptions::top_down(),
    );
    let canvas = Arc::new(Canvas::new(100, 100, 2, 4, 8, Rgba::TRANSPARENT).unwrap());
    Arc::new(RenderContext::new(
        canvas,
        projector,
        shared(flat_grid(500.0)),
        LatLonResolution {
            latitude: 1.0,
            longitude: 1.0,
        },
    ))
}

fn unit_square_tiles() -> TileLayout {
    TileLayout::new(
        bbox::unit_square(),
        LatLonResolution {
            latitude: 1.0,
            longitude: 1.0,
        },
        6,
    )
}

/// Tiles 1 and 3 lie east of 5 degrees; only the western half is drawn.
fn check_eastern_tiles_aborted(context: &RenderContext) {
    let counters = &context.counters;
    assert_eq!(counters.failed_tiles.load(Ordering::Relaxed), 2);
    assert_eq!(counters.tiles.load(Ordering::Relaxed), 2);
    assert_eq!(counters.strips.load(Ordering::Relaxed), 10);

    let canvas = &context.canvas;
    for y in [42, 57] {
        assert!(canvas.pixel(37, y) >> 24 != 0, "west pixel (37, {}) empty", y);
        assert_eq!(canvas.pixel(62, y), Rgba::TRANSPARENT.to_argb());
    }
}

#[test]
fn test_direct_tiles_outside_projection_are_skipped() {
    let context = west_half_context();
    let layout = unit_square_tiles();
    let strips: Vec<usize> = layout
        .tiles()
        .map(|tile| context.render_tile_direct(&tile))
        .collect();
    assert_eq!(strips, vec![5, 0, 5, 0]);
    check_eastern_tiles_aborted(&context);
}

#[test]
fn test_pipelined_tiles_outside_projection_are_skipped() {
    let context = west_half_context();
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(Pipeline::new()),
        Arc::clone(&context) as Arc<dyn WorkHandler>,
        Duration::from_millis(1),
        Duration::from_secs(10),
    );
    orchestrator.start().unwrap();
    for tile in unit_square_tiles().tiles() {
        assert!(orchestrator.pipeline().enqueue(TileJob { tile }));
    }
    orchestrator.stop(true).unwrap();

    assert!(orchestrator.are_all_completed());
    assert!(orchestrator.are_queues_empty());
    let stats = orchestrator.stats();
    assert!(stats.iter().all(|s| s.state == StageState::Completed && s.faults == 0));
    assert_eq!(orchestrator.control(WorkKind::TileProcess).processed(), 4);
    check_eastern_tiles_aborted(&context);
}
