//! Color compositing.
//!
//! `overlay` is the single blending primitive: every sample resolves by
//! folding its fragment stack through it, oldest fragment first, over the
//! background color.

use dem_common::Rgba;

/// Interpolate each channel of `a` toward `b` by `ratio` (0 = `a`, 1 = `b`).
#[inline]
pub fn interpolate(a: Rgba, b: Rgba, ratio: f64) -> Rgba {
    let ratio = ratio.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| -> u8 {
        let v = x as f64 + (y as f64 - x as f64) * ratio;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}

/// Composite fragment `a` over backdrop `b`.
///
/// Alpha 0 yields `b`, alpha 255 yields `a`; anything between mixes each
/// channel toward `b` by `1 - a.alpha / 255` and keeps the larger alpha.
#[inline]
pub fn overlay(a: Rgba, b: Rgba) -> Rgba {
    match a.a {
        0 => b,
        255 => a,
        alpha => {
            let ratio = 1.0 - alpha as f64 / 255.0;
            let mut out = interpolate(a, b, ratio);
            out.a = alpha.max(b.a);
            out
        }
    }
}

/// Packed `0xAARRGGBB` form of [`overlay`].
#[inline]
pub fn overlay_argb(a: u32, b: u32) -> u32 {
    overlay(Rgba::from_argb(a), Rgba::from_argb(b)).to_argb()
}

/// Composite a stack of fragments, oldest first, over `background`.
pub fn composite<I>(fragments: I, background: Rgba) -> Rgba
where
    I: IntoIterator<Item = Rgba>,
{
    fragments
        .into_iter()
        .fold(background, |backdrop, fragment| overlay(fragment, backdrop))
}

/// Barycentric blend of three vertex colors.
#[inline]
pub fn blend3(c0: Rgba, c1: Rgba, c2: Rgba, w: [f64; 3]) -> Rgba {
    let mix = |x: u8, y: u8, z: u8| -> u8 {
        let v = x as f64 * w[0] + y as f64 * w[1] + z as f64 * w[2];
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba::new(
        mix(c0.r, c1.r, c2.r),
        mix(c0.g, c1.g, c2.g),
        mix(c0.b, c1.b, c2.b),
        mix(c0.a, c1.a, c2.a),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_fragment_replaces_backdrop() {
        let a = Rgba::new(10, 20, 30, 255);
        for b in [Rgba::WHITE, Rgba::TRANSPARENT, Rgba::new(1, 2, 3, 4)] {
            assert_eq!(overlay(a, b), a);
        }
    }

    #[test]
    fn test_transparent_fragment_keeps_backdrop() {
        let b = Rgba::new(200, 100, 50, 180);
        assert_eq!(overlay(Rgba::new(9, 9, 9, 0), b), b);
    }

    #[test]
    fn test_partial_overlay_alpha_is_max() {
        let out = overlay(Rgba::new(255, 0, 0, 100), Rgba::new(0, 0, 255, 200));
        assert_eq!(out.a, 200);
        let out = overlay(Rgba::new(255, 0, 0, 220), Rgba::new(0, 0, 255, 30));
        assert_eq!(out.a, 220);
    }

    #[test]
    fn test_partial_overlay_mixes_toward_backdrop() {
        // alpha 51 -> ratio 0.8 toward the backdrop
        let out = overlay(Rgba::new(255, 0, 0, 51), Rgba::new(0, 0, 255, 255));
        assert_eq!((out.r, out.g, out.b), (51, 0, 204));
    }

    #[test]
    fn test_composite_newest_on_top() {
        let red = Rgba::opaque(255, 0, 0);
        let blue = Rgba::opaque(0, 0, 255);
        assert_eq!(composite([red, blue], Rgba::WHITE), blue);
        assert_eq!(composite(std::iter::empty(), Rgba::WHITE), Rgba::WHITE);
    }

    #[test]
    fn test_argb_overlay_matches() {
        let a = Rgba::new(255, 0, 0, 128);
        let b = Rgba::opaque(0, 255, 0);
        assert_eq!(overlay_argb(a.to_argb(), b.to_argb()), overlay(a, b).to_argb());
    }
}
