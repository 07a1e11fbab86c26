//! Subpixel fragment-stack framebuffer.
//!
//! Every sample keeps a bounded, insertion-ordered stack of fragments. When a
//! stack is full the oldest fragment is evicted. A pixel resolves by
//! compositing each of its samples' stacks over the background, oldest first,
//! and box-filtering the results.

use crate::color::composite;
use crate::error::Result;
use crate::sampling::{try_alloc, SampleLayout};
use dem_common::Rgba;

#[derive(Debug, Clone)]
pub struct SubpixelFramebuffer {
    layout: SampleLayout,
    stack_depth: usize,
    background: Rgba,
    /// Ring storage, `stack_depth` packed ARGB slots per sample.
    fragments: Vec<u32>,
    /// Fragments currently held per sample.
    lens: Vec<u16>,
    /// Ring slot of the oldest fragment per sample.
    heads: Vec<u16>,
}

impl SubpixelFramebuffer {
    pub fn new(
        width: usize,
        height: usize,
        subpixel_width: usize,
        stack_depth: usize,
        background: Rgba,
    ) -> Result<Self> {
        Self::band(width, height, subpixel_width, 0, stack_depth, background)
    }

    /// Framebuffer covering `rows` pixel rows starting at canvas row `first_row`.
    pub fn band(
        width: usize,
        rows: usize,
        subpixel_width: usize,
        first_row: usize,
        stack_depth: usize,
        background: Rgba,
    ) -> Result<Self> {
        let stack_depth = stack_depth.clamp(1, u16::MAX as usize);
        let layout = SampleLayout::new(width, rows, subpixel_width, first_row)?;
        let samples = layout.sample_count();
        let slots = samples.saturating_mul(stack_depth);
        Ok(Self {
            layout,
            stack_depth,
            background,
            fragments: try_alloc(slots, 0u32)?,
            lens: try_alloc(samples, 0u16)?,
            heads: try_alloc(samples, 0u16)?,
        })
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_depth
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    /// Empty every stack; samples resolve to `background` until written.
    pub fn reset(&mut self, background: Rgba) {
        self.background = background;
        self.lens.fill(0);
        self.heads.fill(0);
    }

    /// Push a fragment onto the stack at `(x, y)`.
    ///
    /// `z` is not used for ordering; the caller depth-tests before writing.
    pub fn set(&mut self, x: f64, y: f64, _z: f64, color: Rgba) -> Result<()> {
        let sample = self.layout.checked_index(x, y)?;
        self.push(sample, color.to_argb());
        Ok(())
    }

    fn push(&mut self, sample: usize, argb: u32) {
        let depth = self.stack_depth;
        let base = sample * depth;
        let len = self.lens[sample] as usize;
        let head = self.heads[sample] as usize;
        if len < depth {
            self.fragments[base + (head + len) % depth] = argb;
            self.lens[sample] += 1;
        } else {
            self.fragments[base + head] = argb;
            self.heads[sample] = ((head + 1) % depth) as u16;
        }
    }

    fn sample_stack(&self, sample: usize) -> impl Iterator<Item = Rgba> + '_ {
        let depth = self.stack_depth;
        let base = sample * depth;
        let head = self.heads[sample] as usize;
        (0..self.lens[sample] as usize)
            .map(move |i| Rgba::from_argb(self.fragments[base + (head + i) % depth]))
    }

    /// Fragments at `(x, y)`, oldest first. Empty outside the buffer.
    pub fn stack(&self, x: f64, y: f64) -> Vec<Rgba> {
        match self.layout.index(x, y) {
            Some(sample) => self.sample_stack(sample).collect(),
            None => Vec::new(),
        }
    }

    /// Resolved color of pixel `(px, py)`, `None` outside the buffer.
    pub fn resolve_pixel(&self, px: usize, py: usize) -> Option<Rgba> {
        let n = self.layout.samples_per_pixel();
        let mut sums = [0u32; 4];
        let mut count = 0usize;
        for sample in self.layout.pixel_samples(px, py) {
            let c = composite(self.sample_stack(sample), self.background);
            sums[0] += c.r as u32;
            sums[1] += c.g as u32;
            sums[2] += c.b as u32;
            sums[3] += c.a as u32;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        debug_assert_eq!(count, n);
        let avg = |s: u32| -> u8 { (s as f64 / count as f64).round() as u8 };
        Some(Rgba::new(avg(sums[0]), avg(sums[1]), avg(sums[2]), avg(sums[3])))
    }

    /// Packed `0xAARRGGBB` color of pixel `(px, py)`; the background outside the buffer.
    pub fn get(&self, px: usize, py: usize) -> u32 {
        self.resolve_pixel(px, py)
            .unwrap_or(self.background)
            .to_argb()
    }

    /// Pixel color unpacked as `[r, g, b, a]`.
    pub fn get_rgba(&self, px: usize, py: usize) -> [u8; 4] {
        Rgba::from_argb(self.get(px, py)).to_array()
    }

    /// Whether any sample of the pixel holds a fragment.
    pub fn is_pixel_filled(&self, px: usize, py: usize) -> bool {
        self.layout
            .pixel_samples(px, py)
            .any(|sample| self.lens[sample] > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    #[test]
    fn test_empty_pixel_is_background() {
        let bg = Rgba::new(10, 20, 30, 40);
        let fb = SubpixelFramebuffer::new(4, 4, 2, 3, bg).unwrap();
        assert_eq!(fb.get(1, 1), bg.to_argb());
        assert!(!fb.is_pixel_filled(1, 1));
    }

    #[test]
    fn test_uniform_samples_resolve_exactly() {
        let c = Rgba::new(13, 200, 77, 255);
        let mut fb = SubpixelFramebuffer::new(4, 4, 3, 2, Rgba::TRANSPARENT).unwrap();
        for dy in 0..3 {
            for dx in 0..3 {
                fb.set(2.0 + dx as f64 / 3.0, 1.0 + dy as f64 / 3.0, 0.0, c)
                    .unwrap();
            }
        }
        assert_eq!(fb.get(2, 1), c.to_argb());
        assert_eq!(fb.get_rgba(2, 1), [13, 200, 77, 255]);
    }

    #[test]
    fn test_box_filter_averages_samples() {
        let mut fb = SubpixelFramebuffer::new(2, 2, 2, 1, Rgba::BLACK).unwrap();
        fb.set(0.0, 0.0, 0.0, Rgba::WHITE).unwrap();
        fb.set(0.5, 0.0, 0.0, Rgba::WHITE).unwrap();
        // two white + two black samples
        assert_eq!(fb.get_rgba(0, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn test_stack_evicts_oldest() {
        let mut fb = SubpixelFramebuffer::new(1, 1, 1, 2, Rgba::TRANSPARENT).unwrap();
        let colors = [Rgba::opaque(1, 0, 0), Rgba::opaque(2, 0, 0), Rgba::opaque(3, 0, 0)];
        for c in colors {
            fb.set(0.0, 0.0, 0.0, c).unwrap();
        }
        assert_eq!(fb.stack(0.0, 0.0), vec![colors[1], colors[2]]);
        assert_eq!(fb.get(0, 0), colors[2].to_argb());
    }

    #[test]
    fn test_translucent_fragment_over_background() {
        let mut fb = SubpixelFramebuffer::new(1, 1, 1, 4, Rgba::opaque(0, 0, 255)).unwrap();
        fb.set(0.0, 0.0, 0.0, Rgba::new(255, 0, 0, 51)).unwrap();
        assert_eq!(fb.get_rgba(0, 0), [51, 0, 204, 255]);
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut fb = SubpixelFramebuffer::new(2, 2, 2, 1, Rgba::BLACK).unwrap();
        assert!(matches!(
            fb.set(-1.0, 0.0, 0.0, Rgba::WHITE),
            Err(RenderError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_reset_clears_stacks() {
        let mut fb = SubpixelFramebuffer::new(2, 2, 1, 2, Rgba::BLACK).unwrap();
        fb.set(1.0, 1.0, 0.0, Rgba::WHITE).unwrap();
        fb.reset(Rgba::TRANSPARENT);
        assert!(fb.stack(1.0, 1.0).is_empty());
        assert_eq!(fb.get(1, 1), 0);
    }
}
