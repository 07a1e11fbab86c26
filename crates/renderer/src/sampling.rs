//! Subpixel sample addressing shared by the depth buffer and framebuffer.
//!
//! A continuous canvas coordinate `(x, y)` lands on sample column
//! `round(x * sw)` and sample row `round(y * sw)`, where `sw` is the subpixel
//! width. Samples are stored row-major. A layout may cover only a horizontal
//! band of the canvas, in which case its rows start at `first_row`.

use crate::error::{RenderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Canvas width in pixels.
    pub width: usize,
    /// Pixel rows covered by this layout.
    pub rows: usize,
    pub subpixel_width: usize,
    /// First pixel row covered by this layout.
    pub first_row: usize,
}

impl SampleLayout {
    pub fn new(width: usize, rows: usize, subpixel_width: usize, first_row: usize) -> Result<Self> {
        if subpixel_width == 0 {
            return Err(RenderError::config("subpixel_width must be > 0"));
        }
        let layout = Self {
            width,
            rows,
            subpixel_width,
            first_row,
        };
        // Reject layouts whose sample count overflows.
        layout
            .checked_sample_count()
            .ok_or(RenderError::ResourceExhausted { bytes: usize::MAX })?;
        Ok(layout)
    }

    fn checked_sample_count(&self) -> Option<usize> {
        self.width
            .checked_mul(self.subpixel_width)?
            .checked_mul(self.rows)?
            .checked_mul(self.subpixel_width)
    }

    #[inline]
    pub fn sample_columns(&self) -> usize {
        self.width * self.subpixel_width
    }

    #[inline]
    pub fn sample_rows(&self) -> usize {
        self.rows * self.subpixel_width
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.sample_columns() * self.sample_rows()
    }

    /// Number of samples inside one pixel.
    #[inline]
    pub fn samples_per_pixel(&self) -> usize {
        self.subpixel_width * self.subpixel_width
    }

    /// Global sample row of a canvas y coordinate, if it is addressable at all.
    #[inline]
    pub fn sample_row(subpixel_width: usize, y: f64) -> Option<usize> {
        let r = (y * subpixel_width as f64).round();
        (r.is_finite() && r >= 0.0).then_some(r as usize)
    }

    /// Storage index of the sample at `(x, y)`, or `None` if it lies outside.
    #[inline]
    pub fn index(&self, x: f64, y: f64) -> Option<usize> {
        let sw = self.subpixel_width as f64;
        let c = (x * sw).round();
        let r = (y * sw).round();
        if !(c.is_finite() && r.is_finite()) || c < 0.0 || r < 0.0 {
            return None;
        }
        let (c, r) = (c as usize, r as usize);
        let r = r.checked_sub(self.first_row * self.subpixel_width)?;
        if c >= self.sample_columns() || r >= self.sample_rows() {
            return None;
        }
        Some(r * self.sample_columns() + c)
    }

    /// Like [`index`](Self::index) but reports the coordinate on failure.
    #[inline]
    pub fn checked_index(&self, x: f64, y: f64) -> Result<usize> {
        self.index(x, y).ok_or(RenderError::OutOfBounds { x, y })
    }

    /// Storage indices of every sample inside pixel `(px, py)` (`py` is a
    /// canvas row). Empty when the pixel is outside this layout.
    pub fn pixel_samples(&self, px: usize, py: usize) -> impl Iterator<Item = usize> {
        let sw = self.subpixel_width;
        let inside = px < self.width && py >= self.first_row && py < self.first_row + self.rows;
        let columns = self.sample_columns();
        let base_row = py.saturating_sub(self.first_row) * sw;
        let base_col = px * sw;
        let n = if inside { sw } else { 0 };
        (0..n).flat_map(move |dy| (0..n).map(move |dx| (base_row + dy) * columns + base_col + dx))
    }
}

/// Allocate `len` copies of `value`, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let bytes = len.saturating_mul(std::mem::size_of::<T>());
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| RenderError::ResourceExhausted { bytes })?;
    buf.resize(len, value);
    Ok(buf)
}
