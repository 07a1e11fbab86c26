//! Scan conversion into a [`Canvas`].
//!
//! Everything is sampled at subpixel centers: sample column `c` sits at
//! `x = c / sw` and sample row `r` at `y = r / sw`, which round-trips exactly
//! through the canvas addressing. Each covered sample is depth-tested and
//! written through [`Canvas::plot`]. All functions return the number of
//! fragments kept.

use crate::canvas::Canvas;
use crate::color::{blend3, interpolate};
use crate::geometry::{Edge, Line, ScanlinePath, Triangle, TriangleStrip, Vertex};
use dem_common::Rgba;

/// Inclusive sample index range covering `[lo, hi]`, clipped to `[0, limit)`.
fn sample_range(lo: f64, hi: f64, sw: f64, limit: usize) -> Option<(usize, usize)> {
    if !(lo.is_finite() && hi.is_finite()) || limit == 0 {
        return None;
    }
    let first = (lo * sw).ceil().max(0.0);
    let last = (hi * sw).floor().min((limit - 1) as f64);
    (first <= last).then(|| (first as usize, last as usize))
}

#[inline]
fn edge_function(a: &Vertex, b: &Vertex, x: f64, y: f64) -> f64 {
    (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x)
}

/// Fill one triangle, interpolating depth and color barycentrically.
pub fn fill_triangle(canvas: &Canvas, triangle: &Triangle) -> usize {
    let Triangle { v0, v1, v2 } = triangle;
    let area = triangle.doubled_area();
    if area == 0.0 || !area.is_finite() {
        return 0;
    }

    let sw = canvas.subpixel_width() as f64;
    let min_y = v0.y.min(v1.y).min(v2.y);
    let max_y = v0.y.max(v1.y).max(v2.y);
    let Some((first_row, last_row)) = sample_range(min_y, max_y, sw, canvas.sample_rows()) else {
        return 0;
    };

    let edges = [(v0, v1), (v1, v2), (v2, v0)];
    let mut kept = 0;

    for r in first_row..=last_row {
        let y = r as f64 / sw;

        let mut left = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        for (a, b) in edges {
            if (a.y <= y && y <= b.y) || (b.y <= y && y <= a.y) {
                if a.y == b.y {
                    left = left.min(a.x.min(b.x));
                    right = right.max(a.x.max(b.x));
                } else {
                    let x = a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x);
                    left = left.min(x);
                    right = right.max(x);
                }
            }
        }

        let Some((first_col, last_col)) = sample_range(left, right, sw, canvas.sample_columns())
        else {
            continue;
        };

        for c in first_col..=last_col {
            let x = c as f64 / sw;
            let w0 = edge_function(v1, v2, x, y) / area;
            let w1 = edge_function(v2, v0, x, y) / area;
            let w2 = 1.0 - w0 - w1;
            let z = w0 * v0.z + w1 * v1.z + w2 * v2.z;
            let color = blend3(v0.color, v1.color, v2.color, [w0, w1, w2]);
            if canvas.plot(x, y, z, color) {
                kept += 1;
            }
        }
    }

    kept
}

/// Fill every triangle of a strip in order.
pub fn fill_strip(canvas: &Canvas, strip: &TriangleStrip) -> usize {
    strip.triangles().map(|t| fill_triangle(canvas, &t)).sum()
}

struct Crossing {
    x: f64,
    z: f64,
    color: Rgba,
}

/// Fill a path with the even-odd rule.
///
/// Depth and color interpolate along each edge and then across each span.
/// With `fill` set, every fragment takes that color instead.
pub fn fill_path(canvas: &Canvas, path: &ScanlinePath, fill: Option<Rgba>) -> usize {
    let Some((min_y, max_y)) = path.vertical_extent() else {
        return 0;
    };
    let sw = canvas.subpixel_width() as f64;
    let Some((first_row, last_row)) = sample_range(min_y, max_y, sw, canvas.sample_rows()) else {
        return 0;
    };

    let edges: Vec<Edge> = path.edges().collect();
    let mut crossings: Vec<Crossing> = Vec::new();
    let mut kept = 0;

    for r in first_row..=last_row {
        let y = r as f64 / sw;

        crossings.clear();
        for Edge { v0: a, v1: b } in &edges {
            // Half-open so a shared vertex counts once.
            let (lo, hi) = if a.y <= b.y { (a, b) } else { (b, a) };
            if lo.y == hi.y || y < lo.y || y >= hi.y {
                continue;
            }
            let t = (y - lo.y) / (hi.y - lo.y);
            crossings.push(Crossing {
                x: lo.x + t * (hi.x - lo.x),
                z: lo.z + t * (hi.z - lo.z),
                color: interpolate(lo.color, hi.color, t),
            });
        }
        crossings.sort_by(|a, b| a.x.total_cmp(&b.x));

        for pair in crossings.chunks_exact(2) {
            let (l, r) = (&pair[0], &pair[1]);
            let Some((first_col, last_col)) = sample_range(l.x, r.x, sw, canvas.sample_columns())
            else {
                continue;
            };
            let span = r.x - l.x;
            for c in first_col..=last_col {
                let x = c as f64 / sw;
                let t = if span > 0.0 { (x - l.x) / span } else { 0.0 };
                let z = l.z + t * (r.z - l.z);
                let color = fill.unwrap_or_else(|| interpolate(l.color, r.color, t));
                if canvas.plot(x, y, z, color) {
                    kept += 1;
                }
            }
        }
    }

    kept
}

/// Draw an edge with a DDA stepping one sample at a time.
pub fn draw_edge(canvas: &Canvas, edge: &Edge) -> usize {
    let Edge { v0, v1 } = edge;
    let (dx, dy) = (v1.x - v0.x, v1.y - v0.y);
    if !(dx.is_finite() && dy.is_finite()) {
        return 0;
    }

    let sw = canvas.subpixel_width() as f64;
    let steps = (dx.abs().max(dy.abs()) * sw).ceil().max(1.0) as usize;
    let mut kept = 0;

    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        // Snap to the sample grid so clipping agrees with addressing.
        let x = ((v0.x + dx * t) * sw).round() / sw;
        let y = ((v0.y + dy * t) * sw).round() / sw;
        if !canvas.contains(x, y) {
            continue;
        }
        let z = v0.z + (v1.z - v0.z) * t;
        if canvas.plot(x, y, z, interpolate(v0.color, v1.color, t)) {
            kept += 1;
        }
    }

    kept
}

/// Draw every edge of a line.
pub fn draw_line(canvas: &Canvas, line: &Line) -> usize {
    line.edges().iter().map(|e| draw_edge(canvas, e)).sum()
}
