//! Synthetic elevation field generators.
//!
//! Every field is row-major from the north-west corner, matching the layout
//! `MemoryGrid::new` expects.

use dem_common::NO_DATA;

/// Create a field where every point has the same elevation.
pub fn create_flat_field(columns: usize, rows: usize, elevation: f64) -> Vec<f64> {
    vec![elevation; columns * rows]
}

/// Create a field rising linearly from west (`low`) to east (`high`).
pub fn create_ramp_field(columns: usize, rows: usize, low: f64, high: f64) -> Vec<f64> {
    let span = (columns.max(2) - 1) as f64;
    (0..rows)
        .flat_map(|_| (0..columns).map(move |col| low + (high - low) * col as f64 / span))
        .collect()
}

/// Create a single Gaussian hill centred on the field.
///
/// The summit reaches `peak`; the edges fall to roughly zero.
pub fn create_hill_field(columns: usize, rows: usize, peak: f64) -> Vec<f64> {
    let cx = (columns as f64 - 1.0) / 2.0;
    let cy = (rows as f64 - 1.0) / 2.0;
    let sigma = (columns.min(rows) as f64 / 4.0).max(1.0);

    let mut field = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for col in 0..columns {
            let dx = col as f64 - cx;
            let dy = row as f64 - cy;
            let r2 = (dx * dx + dy * dy) / (2.0 * sigma * sigma);
            field.push(peak * (-r2).exp());
        }
    }
    field
}

/// Replace a rectangular block of points with [`NO_DATA`].
pub fn punch_hole(
    field: &mut [f64],
    columns: usize,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) {
    for row in rows {
        for col in cols.clone() {
            if let Some(v) = field.get_mut(row * columns + col) {
                *v = NO_DATA;
            }
        }
    }
}
