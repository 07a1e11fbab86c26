//! RGBA color values and packed ARGB conversion.

use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Pack into a single `0xAARRGGBB` integer.
    #[inline]
    pub fn to_argb(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Unpack a `0xAARRGGBB` integer.
    #[inline]
    pub fn from_argb(argb: u32) -> Self {
        Self {
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
            a: (argb >> 24) as u8,
        }
    }

    /// Channels as `[r, g, b, a]`.
    #[inline]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn from_array(rgba: [u8; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    /// Parse "#RRGGBB" or "#RRGGBBAA".
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_packing() {
        let c = Rgba::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.to_argb(), 0x7812_3456);
        assert_eq!(Rgba::from_argb(0x7812_3456), c);
    }

    #[test]
    fn test_from_hex() {
        assert_eq!(Rgba::from_hex("#ff8000"), Some(Rgba::opaque(255, 128, 0)));
        assert_eq!(Rgba::from_hex("00000080"), Some(Rgba::new(0, 0, 0, 128)));
        assert_eq!(Rgba::from_hex("#fff"), None);
    }
}
