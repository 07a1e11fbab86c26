//! Per-sample depth storage.
//!
//! Greater z is nearer the camera. A sample that was never written holds NaN
//! and accepts any candidate.

use crate::error::Result;
use crate::sampling::{try_alloc, SampleLayout};

#[derive(Debug, Clone)]
pub struct DepthBuffer {
    layout: SampleLayout,
    depths: Vec<f64>,
}

impl DepthBuffer {
    /// Depth buffer for a whole `width` x `height` canvas.
    pub fn new(width: usize, height: usize, subpixel_width: usize) -> Result<Self> {
        Self::band(width, height, subpixel_width, 0)
    }

    /// Depth buffer covering `rows` pixel rows starting at canvas row `first_row`.
    pub fn band(width: usize, rows: usize, subpixel_width: usize, first_row: usize) -> Result<Self> {
        let layout = SampleLayout::new(width, rows, subpixel_width, first_row)?;
        let depths = try_alloc(layout.sample_count(), f64::NAN)?;
        Ok(Self { layout, depths })
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    /// Forget every stored depth.
    pub fn reset(&mut self) {
        self.depths.fill(f64::NAN);
    }

    /// Store `z` at `(x, y)`.
    pub fn set(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        let index = self.layout.checked_index(x, y)?;
        self.depths[index] = z;
        Ok(())
    }

    /// Stored depth, NaN if never written or outside the buffer.
    #[inline]
    pub fn get(&self, x: f64, y: f64) -> f64 {
        self.layout
            .index(x, y)
            .map_or(f64::NAN, |index| self.depths[index])
    }

    /// Whether a fragment at depth `z` would be seen at `(x, y)`.
    #[inline]
    pub fn is_visible(&self, x: f64, y: f64, z: f64) -> bool {
        let stored = self.get(x, y);
        stored.is_nan() || z > stored
    }
}
