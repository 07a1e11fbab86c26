//! Tile layout and per-tile strip building.

use crate::error::Result;
use crate::geometry::TriangleStrip;
use crate::projector::Projector;
use dem_common::{is_no_data, BoundingBox, ElevationGrid, LatLonResolution};
use serde::{Deserialize, Serialize};

/// Absorbs float error when counting whole steps across a span.
const STEP_EPSILON: f64 = 1e-9;

/// Number of `step`-sized pieces needed to cover `span`.
fn steps_across(span: f64, step: f64) -> usize {
    if !(span > 0.0 && step > 0.0) {
        return 0;
    }
    (span / step - STEP_EPSILON).ceil().max(1.0) as usize
}

/// A geographic sub-region rendered as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Zero-based position in iteration order.
    pub index: usize,
    pub row: usize,
    pub column: usize,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Tile {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.north, self.south, self.east, self.west)
    }
}

/// How a bounding box splits into tiles.
///
/// A tile spans `tile_size` grid points, so neighbours share their edge row
/// and column: tile height is `resolution * tile_size - resolution`. Rows run
/// north to south, columns west to east, and the last tile in each direction
/// is clamped to the bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    bounds: BoundingBox,
    tile_height: f64,
    tile_width: f64,
    rows: usize,
    columns: usize,
}

impl TileLayout {
    pub fn new(bounds: BoundingBox, resolution: LatLonResolution, tile_size: usize) -> Self {
        let cells = tile_size.saturating_sub(1).max(1) as f64;
        let tile_height = resolution.latitude * cells;
        let tile_width = resolution.longitude * cells;
        Self {
            bounds,
            tile_height,
            tile_width,
            rows: steps_across(bounds.latitude_span(), tile_height),
            columns: steps_across(bounds.longitude_span(), tile_width),
        }
    }

    pub fn tile_height(&self) -> f64 {
        self.tile_height
    }

    pub fn tile_width(&self) -> f64 {
        self.tile_width
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn tile_count(&self) -> usize {
        self.rows * self.columns
    }

    /// The `index`-th tile in iteration order.
    pub fn tile(&self, index: usize) -> Option<Tile> {
        if index >= self.tile_count() {
            return None;
        }
        let (row, column) = (index / self.columns, index % self.columns);
        let north = self.bounds.north - row as f64 * self.tile_height;
        let west = self.bounds.west + column as f64 * self.tile_width;
        Some(Tile {
            index,
            row,
            column,
            north,
            south: (north - self.tile_height).max(self.bounds.south),
            east: (west + self.tile_width).min(self.bounds.east),
            west,
        })
    }

    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tile_count()).filter_map(|i| self.tile(i))
    }
}

/// Walks a tile of the grid and emits projected triangle strips.
///
/// Each grid row yields one strip whose vertices alternate between the row's
/// top and bottom latitude, west to east. A missing elevation ends the current
/// strip; the next one starts after the gap.
pub struct TileBuilder<'a> {
    grid: &'a dyn ElevationGrid,
    projector: &'a Projector,
    step: LatLonResolution,
}

impl<'a> TileBuilder<'a> {
    pub fn new(grid: &'a dyn ElevationGrid, projector: &'a Projector, step: LatLonResolution) -> Self {
        Self {
            grid,
            projector,
            step,
        }
    }

    /// Build every strip of `tile`, handing each non-empty one to `emit`.
    ///
    /// Returns the number of strips emitted. A projection failure aborts the
    /// tile; strips emitted before it stay emitted.
    pub fn build<F>(&self, tile: &Tile, mut emit: F) -> Result<usize>
    where
        F: FnMut(TriangleStrip),
    {
        let rows = steps_across(tile.north - tile.south, self.step.latitude);
        let columns = steps_across(tile.east - tile.west, self.step.longitude);
        let mut emitted = 0;
        let mut strip = TriangleStrip::with_capacity(2 * (columns + 1));

        let mut flush = |strip: &mut TriangleStrip, emitted: &mut usize| {
            if !strip.is_empty() {
                emit(std::mem::take(strip));
                *emitted += 1;
            }
            strip.reset();
        };

        for r in 0..rows {
            let top = tile.north - r as f64 * self.step.latitude;
            let bottom = (top - self.step.latitude).max(tile.south);

            for c in 0..=columns {
                let lon = (tile.west + c as f64 * self.step.longitude).min(tile.east);

                let top_elevation = self.grid.elevation_at(top, lon);
                let bottom_elevation = self.grid.elevation_at(bottom, lon);
                if is_no_data(top_elevation) || is_no_data(bottom_elevation) {
                    flush(&mut strip, &mut emitted);
                    continue;
                }

                strip.add_vertex(self.projector.vertex(
                    top,
                    lon,
                    top_elevation,
                    self.grid.color_at(top, lon),
                )?);
                strip.add_vertex(self.projector.vertex(
                    bottom,
                    lon,
                    bottom_elevation,
                    self.grid.color_at(bottom, lon),
                )?);
            }

            flush(&mut strip, &mut emitted);
        }

        Ok(emitted)
    }
}
