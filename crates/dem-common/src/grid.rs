//! Elevation grid abstraction consumed by the renderer.
//!
//! The renderer only ever asks a grid two questions: the elevation at a
//! geographic coordinate and the base color assigned to it. File decoding,
//! caching and coloring models all live behind this trait.

use crate::{BoundingBox, DemError, DemResult, Rgba};
use serde::{Deserialize, Serialize};

/// Sentinel returned by [`ElevationGrid::elevation_at`] where there is no data.
pub const NO_DATA: f64 = -99999.0;

/// True when an elevation sample is missing.
#[inline]
pub fn is_no_data(elevation: f64) -> bool {
    elevation == NO_DATA || elevation.is_nan()
}

/// A geographic point with elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }
}

/// Elevation and color lookup at a geographic coordinate.
pub trait ElevationGrid: Send + Sync {
    /// Elevation in meters, or [`NO_DATA`].
    fn elevation_at(&self, latitude: f64, longitude: f64) -> f64;

    /// Base color of the terrain at this coordinate.
    fn color_at(&self, latitude: f64, longitude: f64) -> Rgba;

    /// Geographic extent covered by the data.
    fn bounds(&self) -> BoundingBox;

    /// Native (latitude, longitude) resolution in degrees.
    fn resolution(&self) -> (f64, f64);

    /// Declared (minimum, maximum) elevation of the data.
    fn elevation_range(&self) -> (f64, f64);
}

/// A regular lat/lon grid held in memory, row-major from the north-west corner.
///
/// Point `(row, col)` sits at `north - row * lat_res`, `west + col * lon_res`;
/// lookups snap to the nearest point.
#[derive(Debug, Clone)]
pub struct MemoryGrid {
    north: f64,
    west: f64,
    latitude_resolution: f64,
    longitude_resolution: f64,
    rows: usize,
    columns: usize,
    elevations: Vec<f64>,
    colors: Option<Vec<Rgba>>,
    base_color: Rgba,
    min: f64,
    max: f64,
}

impl MemoryGrid {
    /// Create a grid from row-major elevation values.
    pub fn new(
        north: f64,
        west: f64,
        latitude_resolution: f64,
        longitude_resolution: f64,
        columns: usize,
        elevations: Vec<f64>,
    ) -> DemResult<Self> {
        if !(latitude_resolution > 0.0) || !(longitude_resolution > 0.0) {
            return Err(DemError::InvalidResolution(format!(
                "{} x {}",
                latitude_resolution, longitude_resolution
            )));
        }
        if columns == 0 || elevations.is_empty() {
            return Err(DemError::InvalidExtent(format!(
                "{} columns, {} values",
                columns,
                elevations.len()
            )));
        }
        if elevations.len() % columns != 0 {
            return Err(DemError::SizeMismatch {
                expected: (elevations.len() / columns + 1) * columns,
                actual: elevations.len(),
            });
        }

        let rows = elevations.len() / columns;
        let (min, max) = elevations
            .iter()
            .copied()
            .filter(|v| !is_no_data(*v))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 0.0) };

        Ok(Self {
            north,
            west,
            latitude_resolution,
            longitude_resolution,
            rows,
            columns,
            elevations,
            colors: None,
            base_color: Rgba::opaque(128, 128, 128),
            min,
            max,
        })
    }

    /// Attach per-point colors (same layout as the elevations).
    pub fn with_colors(mut self, colors: Vec<Rgba>) -> DemResult<Self> {
        if colors.len() != self.elevations.len() {
            return Err(DemError::SizeMismatch {
                expected: self.elevations.len(),
                actual: colors.len(),
            });
        }
        self.colors = Some(colors);
        Ok(self)
    }

    /// Color used for every point when no per-point colors are attached.
    pub fn with_base_color(mut self, color: Rgba) -> Self {
        self.base_color = color;
        self
    }

    /// Override the declared elevation range.
    pub fn with_elevation_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    fn index(&self, latitude: f64, longitude: f64) -> Option<usize> {
        let row = ((self.north - latitude) / self.latitude_resolution).round();
        let col = ((longitude - self.west) / self.longitude_resolution).round();

        if !row.is_finite() || !col.is_finite() || row < 0.0 || col < 0.0 {
            return None;
        }

        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.columns {
            return None;
        }

        Some(row * self.columns + col)
    }
}

impl ElevationGrid for MemoryGrid {
    fn elevation_at(&self, latitude: f64, longitude: f64) -> f64 {
        self.index(latitude, longitude)
            .map(|i| self.elevations[i])
            .unwrap_or(NO_DATA)
    }

    fn color_at(&self, latitude: f64, longitude: f64) -> Rgba {
        match (&self.colors, self.index(latitude, longitude)) {
            (Some(colors), Some(i)) => colors[i],
            _ => self.base_color,
        }
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.north,
            self.north - (self.rows - 1) as f64 * self.latitude_resolution,
            self.west + (self.columns - 1) as f64 * self.longitude_resolution,
            self.west,
        )
    }

    fn resolution(&self) -> (f64, f64) {
        (self.latitude_resolution, self.longitude_resolution)
    }

    fn elevation_range(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}
