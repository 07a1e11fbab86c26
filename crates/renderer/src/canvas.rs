//! Shared render target written concurrently by every stage.
//!
//! The canvas pairs a [`DepthBuffer`] with a [`SubpixelFramebuffer`] and
//! shards both into horizontal bands of `band_rows` pixel rows. Each band sits
//! behind its own mutex, so the depth test, the depth write and the fragment
//! push for one sample happen atomically while writers in other bands proceed
//! in parallel.

use crate::depth_buffer::DepthBuffer;
use crate::error::{RenderError, Result};
use crate::framebuffer::SubpixelFramebuffer;
use crate::sampling::SampleLayout;
use dem_common::Rgba;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug)]
struct Band {
    depth: DepthBuffer,
    color: SubpixelFramebuffer,
}

#[derive(Debug)]
pub struct Canvas {
    width: usize,
    height: usize,
    subpixel_width: usize,
    band_rows: usize,
    bands: Vec<Mutex<Band>>,
    dropped: AtomicU64,
    written: AtomicU64,
}

impl Canvas {
    /// Allocate a canvas. Fails with `ResourceExhausted` when the buffers do
    /// not fit in memory.
    pub fn new(
        width: usize,
        height: usize,
        subpixel_width: usize,
        stack_depth: usize,
        band_rows: usize,
        background: Rgba,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::config(format!(
                "canvas must not be empty ({}x{})",
                width, height
            )));
        }
        if subpixel_width == 0 {
            return Err(RenderError::config("subpixel_width must be > 0"));
        }
        let band_rows = band_rows.clamp(1, height);
        let band_count = height.div_ceil(band_rows);

        let mut bands = Vec::new();
        bands
            .try_reserve_exact(band_count)
            .map_err(|_| RenderError::ResourceExhausted {
                bytes: band_count * std::mem::size_of::<Mutex<Band>>(),
            })?;
        for i in 0..band_count {
            let first_row = i * band_rows;
            let rows = band_rows.min(height - first_row);
            bands.push(Mutex::new(Band {
                depth: DepthBuffer::band(width, rows, subpixel_width, first_row)?,
                color: SubpixelFramebuffer::band(
                    width,
                    rows,
                    subpixel_width,
                    first_row,
                    stack_depth,
                    background,
                )?,
            }));
        }

        debug!(
            width,
            height,
            subpixel_width,
            stack_depth,
            bands = band_count,
            "Allocated canvas"
        );

        Ok(Self {
            width,
            height,
            subpixel_width,
            band_rows,
            bands,
            dropped: AtomicU64::new(0),
            written: AtomicU64::new(0),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn subpixel_width(&self) -> usize {
        self.subpixel_width
    }

    /// Sample columns across the canvas.
    pub fn sample_columns(&self) -> usize {
        self.width * self.subpixel_width
    }

    /// Sample rows down the canvas.
    pub fn sample_rows(&self) -> usize {
        self.height * self.subpixel_width
    }

    /// Whether `(x, y)` addresses a sample on this canvas.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let sw = self.subpixel_width as f64;
        let (c, r) = ((x * sw).round(), (y * sw).round());
        c >= 0.0 && r >= 0.0 && c < self.sample_columns() as f64 && r < self.sample_rows() as f64
    }

    /// Fragments rejected because they fell outside the canvas.
    pub fn dropped_fragments(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Fragments that passed the depth test and were stored.
    pub fn written_fragments(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn lock(&self, band: usize) -> MutexGuard<'_, Band> {
        self.bands[band]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn band_of_sample_row(&self, sample_row: usize) -> Option<usize> {
        let band = sample_row / (self.band_rows * self.subpixel_width);
        (band < self.bands.len()).then_some(band)
    }

    fn drop_fragment(&self, x: f64, y: f64) {
        if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!(x, y, "Dropping fragment outside the canvas");
        } else {
            debug!(x, y, "Dropping fragment outside the canvas");
        }
    }

    /// Depth-test a fragment and store it if visible. Returns whether it was kept.
    pub fn plot(&self, x: f64, y: f64, z: f64, color: Rgba) -> bool {
        let band = match SampleLayout::sample_row(self.subpixel_width, y)
            .and_then(|row| self.band_of_sample_row(row))
        {
            Some(band) => band,
            None => {
                self.drop_fragment(x, y);
                return false;
            }
        };

        let mut guard = self.lock(band);
        if !guard.depth.is_visible(x, y, z) {
            return false;
        }
        let stored = guard
            .depth
            .set(x, y, z)
            .and_then(|_| guard.color.set(x, y, z, color));
        drop(guard);

        match stored {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.drop_fragment(x, y);
                false
            }
        }
    }

    /// Stored depth at `(x, y)`, NaN if empty or outside.
    pub fn depth_at(&self, x: f64, y: f64) -> f64 {
        SampleLayout::sample_row(self.subpixel_width, y)
            .and_then(|row| self.band_of_sample_row(row))
            .map_or(f64::NAN, |band| self.lock(band).depth.get(x, y))
    }

    /// Fragment stack at `(x, y)`, oldest first.
    pub fn stack(&self, x: f64, y: f64) -> Vec<Rgba> {
        SampleLayout::sample_row(self.subpixel_width, y)
            .and_then(|row| self.band_of_sample_row(row))
            .map_or_else(Vec::new, |band| self.lock(band).color.stack(x, y))
    }

    fn band_of_pixel_row(&self, py: usize) -> Option<usize> {
        (py < self.height).then(|| py / self.band_rows)
    }

    /// Resolved packed ARGB color of pixel `(px, py)`; 0 outside the canvas.
    pub fn pixel(&self, px: usize, py: usize) -> u32 {
        self.band_of_pixel_row(py)
            .map_or(0, |band| self.lock(band).color.get(px, py))
    }

    pub fn is_pixel_filled(&self, px: usize, py: usize) -> bool {
        self.band_of_pixel_row(py)
            .is_some_and(|band| self.lock(band).color.is_pixel_filled(px, py))
    }

    /// Clear depth and fragments and set a new background.
    pub fn reset(&self, background: Rgba) {
        for band in 0..self.bands.len() {
            let mut guard = self.lock(band);
            guard.depth.reset();
            guard.color.reset(background);
        }
        self.dropped.store(0, Ordering::Relaxed);
        self.written.store(0, Ordering::Relaxed);
    }

    /// Resolve every pixel into a packed ARGB image, one band per task.
    pub fn resolve(&self) -> RasterImage {
        let width = self.width;
        let pixels: Vec<u32> = (0..self.bands.len())
            .into_par_iter()
            .flat_map_iter(|band| {
                let guard = self.lock(band);
                let first = band * self.band_rows;
                let last = (first + self.band_rows).min(self.height);
                let mut out = Vec::with_capacity((last - first) * width);
                for py in first..last {
                    for px in 0..width {
                        out.push(guard.color.get(px, py));
                    }
                }
                out
            })
            .collect();

        RasterImage {
            width,
            height: self.height,
            pixels,
        }
    }
}

/// A resolved image of packed `0xAARRGGBB` pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl RasterImage {
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Rows of packed pixels, top to bottom.
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        self.pixels
            .chunks(self.width.max(1))
            .map(|row| row.to_vec())
            .collect()
    }

    /// Straight RGBA bytes, 4 per pixel.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&argb| Rgba::from_argb(argb).to_array())
            .collect()
    }

    /// Count of pixels whose alpha is non-zero.
    pub fn covered_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p >> 24 != 0).count()
    }
}
