//! Procedural terrain used when no elevation source is wired in.

use anyhow::Result;
use dem_common::{BoundingBox, MemoryGrid, Rgba};
use renderer::color::interpolate;

/// Peaks as (latitude fraction, longitude fraction, height m, radius fraction).
const PEAKS: [(f64, f64, f64, f64); 5] = [
    (0.30, 0.25, 3200.0, 0.12),
    (0.45, 0.60, 4100.0, 0.10),
    (0.70, 0.40, 2600.0, 0.15),
    (0.60, 0.80, 1900.0, 0.08),
    (0.20, 0.75, 1400.0, 0.20),
];

const LOWLAND: Rgba = Rgba::opaque(70, 130, 60);
const UPLAND: Rgba = Rgba::opaque(150, 120, 80);
const SNOW: Rgba = Rgba::opaque(245, 245, 250);

/// Elevation at fractional position `(u, v)` across the extent.
fn elevation(u: f64, v: f64) -> f64 {
    let base = 200.0 + 150.0 * (u * 7.0).sin() * (v * 5.0).cos();
    PEAKS.iter().fold(base, |acc, &(pu, pv, height, radius)| {
        let d2 = (u - pu).powi(2) + (v - pv).powi(2);
        acc + height * (-d2 / (2.0 * radius * radius)).exp()
    })
}

/// Hypsometric tint from green lowland through brown to snow.
fn tint(elevation: f64, max: f64) -> Rgba {
    let t = (elevation / max.max(1.0)).clamp(0.0, 1.0);
    if t < 0.6 {
        interpolate(LOWLAND, UPLAND, t / 0.6)
    } else {
        interpolate(UPLAND, SNOW, (t - 0.6) / 0.4)
    }
}

/// Build a colored grid covering `bounds` at `resolution` degrees.
pub fn synthetic_grid(bounds: BoundingBox, resolution: f64) -> Result<MemoryGrid> {
    let rows = (bounds.latitude_span() / resolution).round() as usize + 1;
    let columns = (bounds.longitude_span() / resolution).round() as usize + 1;

    let mut elevations = Vec::with_capacity(rows * columns);
    for row in 0..rows {
        let u = row as f64 / (rows - 1).max(1) as f64;
        for col in 0..columns {
            let v = col as f64 / (columns - 1).max(1) as f64;
            elevations.push(elevation(u, v));
        }
    }

    let max = elevations.iter().cloned().fold(0.0, f64::max);
    let colors = elevations.iter().map(|&e| tint(e, max)).collect();

    let grid = MemoryGrid::new(
        bounds.north,
        bounds.west,
        resolution,
        resolution,
        columns,
        elevations,
    )?
    .with_colors(colors)?;
    Ok(grid)
}
