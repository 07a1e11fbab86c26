//! Tests for the canvas and rasterizers.
//!
//! Covers:
//! - Depth ordering in both directions
//! - Fragment stack compositing and the box filter
//! - Concurrent writes to the same sample
//! - Strips built from elevation grids, including gaps in the data

use dem_common::{LatLonResolution, Rgba, NO_DATA};
use renderer::color::composite;
use renderer::raster::{fill_strip, fill_triangle};
use renderer::{Canvas, TileBuilder, TileLayout, Triangle, TriangleStrip, Vertex};
use std::sync::Arc;
use test_utils::{bbox, create_flat_field, grid_over_unit_square, punch_hole, top_down_projector};

// ============================================================================
// Helper functions
// ============================================================================

fn canvas(width: usize, height: usize, sw: usize) -> Canvas {
    Canvas::new(width, height, sw, 4, 4, Rgba::TRANSPARENT).unwrap()
}

fn one_degree() -> LatLonResolution {
    LatLonResolution {
        latitude: 1.0,
        longitude: 1.0,
    }
}

fn square(z: f64, color: Rgba) -> TriangleStrip {
    let mut strip = TriangleStrip::new();
    for (x, y) in [(0.0, 0.0), (0.0, 7.0), (7.0, 0.0), (7.0, 7.0)] {
        strip.add_vertex(Vertex::new(x, y, z, color));
    }
    strip
}

// ============================================================================
// Depth tests
// ============================================================================

#[test]
fn test_nearer_fragment_replaces_farther() {
    let canvas = canvas(4, 4, 1);
    assert!(canvas.plot(1.0, 1.0, 1.0, Rgba::opaque(0, 0, 255)));
    assert!(canvas.plot(1.0, 1.0, 2.0, Rgba::opaque(255, 0, 0)));
    assert_eq!(canvas.depth_at(1.0, 1.0), 2.0);
    assert_eq!(canvas.pixel(1, 1), Rgba::opaque(255, 0, 0).to_argb());
}

#[test]
fn test_farther_fragment_is_hidden() {
    let canvas = canvas(4, 4, 1);
    assert!(canvas.plot(1.0, 1.0, 2.0, Rgba::opaque(255, 0, 0)));
    assert!(!canvas.plot(1.0, 1.0, 1.0, Rgba::opaque(0, 0, 255)));
    assert_eq!(canvas.depth_at(1.0, 1.0), 2.0);
    assert_eq!(canvas.stack(1.0, 1.0).len(), 1);
}

#[test]
fn test_equal_depth_loses() {
    let canvas = canvas(4, 4, 1);
    assert!(canvas.plot(2.0, 2.0, 3.0, Rgba::WHITE));
    assert!(!canvas.plot(2.0, 2.0, 3.0, Rgba::BLACK));
    assert_eq!(canvas.pixel(2, 2), Rgba::WHITE.to_argb());
}

#[test]
fn test_empty_sample_depth_is_nan() {
    let canvas = canvas(4, 4, 2);
    assert!(canvas.depth_at(0.5, 0.5).is_nan());
}

#[test]
fn test_strip_in_front_covers_strip_behind() {
    let canvas = canvas(8, 8, 2);
    let near = Rgba::opaque(10, 200, 10);
    fill_strip(&canvas, &square(1.0, Rgba::opaque(200, 10, 10)));
    let kept = fill_strip(&canvas, &square(5.0, near));
    assert!(kept > 0);
    assert_eq!(canvas.pixel(3, 3), near.to_argb());

    // Drawing the far one again changes nothing.
    assert_eq!(fill_strip(&canvas, &square(1.0, Rgba::BLACK)), 0);
}

// ============================================================================
// Compositing and filtering
// ============================================================================

#[test]
fn test_translucent_fragments_composite_oldest_first() {
    let canvas = canvas(2, 2, 1);
    let base = Rgba::opaque(255, 0, 0);
    let glass = Rgba::new(0, 0, 255, 128);

    canvas.plot(0.0, 0.0, 1.0, base);
    canvas.plot(0.0, 0.0, 2.0, glass);

    let expected = composite([base, glass], Rgba::TRANSPARENT);
    assert_eq!(canvas.pixel(0, 0), expected.to_argb());
    assert_eq!(canvas.stack(0.0, 0.0), vec![base, glass]);
}

#[test]
fn test_uniform_pixel_resolves_exactly() {
    let canvas = canvas(4, 4, 3);
    let color = Rgba::opaque(12, 34, 56);
    for sy in 0..3 {
        for sx in 0..3 {
            canvas.plot(3.0 + sx as f64 / 3.0, 1.0 + sy as f64 / 3.0, 1.0, color);
        }
    }
    assert_eq!(canvas.pixel(3, 1), color.to_argb());
    assert!(canvas.is_pixel_filled(3, 1));
    assert!(!canvas.is_pixel_filled(2, 1));
}

#[test]
fn test_half_covered_pixel_averages_with_background() {
    let canvas = canvas(2, 2, 2);
    canvas.plot(0.0, 0.0, 1.0, Rgba::WHITE);
    canvas.plot(0.5, 0.0, 1.0, Rgba::WHITE);

    let pixel = Rgba::from_argb(canvas.pixel(0, 0));
    assert_eq!(pixel.a, 128);
}

#[test]
fn test_resolve_matches_pixel_reads() {
    let canvas = canvas(8, 8, 2);
    fill_triangle(
        &canvas,
        &Triangle::new(
            Vertex::new(0.0, 0.0, 1.0, Rgba::WHITE),
            Vertex::new(7.5, 0.0, 1.0, Rgba::WHITE),
            Vertex::new(0.0, 7.5, 1.0, Rgba::WHITE),
        ),
    );

    let image = canvas.resolve();
    assert_eq!((image.width, image.height), (8, 8));
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(image.get(x, y), Some(canvas.pixel(x, y)));
        }
    }
    assert!(image.covered_pixels() > 0);
}

#[test]
fn test_out_of_bounds_fragments_are_counted() {
    let canvas = canvas(4, 4, 1);
    assert!(!canvas.plot(-1.0, 0.0, 1.0, Rgba::WHITE));
    assert!(!canvas.plot(0.0, 10.0, 1.0, Rgba::WHITE));
    assert_eq!(canvas.dropped_fragments(), 2);
    assert_eq!(canvas.written_fragments(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_writes_keep_nearest() {
    let canvas = Arc::new(Canvas::new(16, 16, 2, 4, 2, Rgba::TRANSPARENT).unwrap());

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let canvas = Arc::clone(&canvas);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let z = (i * 8 + t) as f64;
                    canvas.plot(5.0, 5.0, z, Rgba::opaque(t as u8, 0, 0));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(canvas.depth_at(5.0, 5.0), (199 * 8 + 7) as f64);
    let stack = canvas.stack(5.0, 5.0);
    assert!(!stack.is_empty() && stack.len() <= 4);
    assert_eq!(*stack.last().unwrap(), Rgba::opaque(7, 0, 0));
}

#[test]
fn test_concurrent_strips_in_different_bands() {
    let canvas = Arc::new(Canvas::new(32, 32, 2, 2, 4, Rgba::TRANSPARENT).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|band| {
            let canvas = Arc::clone(&canvas);
            std::thread::spawn(move || {
                let top = band as f64 * 8.0;
                let mut strip = TriangleStrip::new();
                for (x, y) in [(0.0, top), (0.0, top + 7.5), (31.5, top), (31.5, top + 7.5)] {
                    strip.add_vertex(Vertex::new(x, y, 1.0, Rgba::WHITE));
                }
                fill_strip(&canvas, &strip)
            })
        })
        .collect();
    let kept: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(kept as u64, canvas.written_fragments());
    assert_eq!(canvas.resolve().covered_pixels(), 32 * 32);
}

// ============================================================================
// Strips from elevation data
// ============================================================================

#[test]
fn test_tile_emits_one_strip_per_row() {
    let grid = grid_over_unit_square(create_flat_field(11, 11, 500.0));
    let projector = top_down_projector(bbox::unit_square(), 100, 100);
    let layout = TileLayout::new(bbox::unit_square(), one_degree(), 6);
    let tile = layout.tile(0).unwrap();

    let mut strips = Vec::new();
    let emitted = TileBuilder::new(&grid, &projector, one_degree())
        .build(&tile, |strip| strips.push(strip))
        .unwrap();

    assert_eq!(emitted, 5);
    assert_eq!(strips.len(), 5);
    for strip in &strips {
        // six columns, top and bottom vertex each
        assert_eq!(strip.vertex_count(), 12);
        assert_eq!(strip.triangle_count(), 10);
    }

    // Rows run north to south, vertices west to east alternating top/bottom.
    let first = strips[0].vertices();
    assert!(first[0].y < first[1].y);
    assert!(first[0].x < first[2].x);
    assert!(strips[0].vertices()[0].y < strips[1].vertices()[0].y);
}

#[test]
fn test_no_data_splits_strip() {
    let mut field = create_flat_field(11, 11, 500.0);
    // one missing point at latitude 8, longitude 2
    punch_hole(&mut field, 11, 2..3, 2..3);
    let grid = grid_over_unit_square(field);
    let projector = top_down_projector(bbox::unit_square(), 100, 100);
    let tile = TileLayout::new(bbox::unit_square(), one_degree(), 6)
        .tile(0)
        .unwrap();

    let mut counts = Vec::new();
    TileBuilder::new(&grid, &projector, one_degree())
        .build(&tile, |strip| counts.push(strip.vertex_count()))
        .unwrap();

    // Rows touching latitude 8 split into a western and an eastern strip.
    assert_eq!(counts, vec![12, 4, 6, 4, 6, 12, 12]);
}

#[test]
fn test_no_data_row_emits_nothing() {
    let mut field = create_flat_field(11, 11, 500.0);
    punch_hole(&mut field, 11, 0..1, 0..11);
    punch_hole(&mut field, 11, 2..3, 0..11);
    let mut field_all = field.clone();
    for v in field_all.iter_mut().take(11 * 6) {
        *v = NO_DATA;
    }

    let projector = top_down_projector(bbox::unit_square(), 100, 100);
    let tile = TileLayout::new(bbox::unit_square(), one_degree(), 6)
        .tile(0)
        .unwrap();

    let grid = grid_over_unit_square(field);
    let emitted = TileBuilder::new(&grid, &projector, one_degree())
        .build(&tile, |_| {})
        .unwrap();
    // only the two southern rows have data on both edges
    assert_eq!(emitted, 2);

    let grid = grid_over_unit_square(field_all);
    let emitted = TileBuilder::new(&grid, &projector, one_degree())
        .build(&tile, |_| {})
        .unwrap();
    assert_eq!(emitted, 0);
}
