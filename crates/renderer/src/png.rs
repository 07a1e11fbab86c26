//! PNG encoding for resolved images.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the image has at most 256
//!   unique colors (flat-shaded or mostly background renders).
//! - **RGBA PNG (color type 6)**: everything else.

use crate::canvas::RasterImage;
use crate::error::{RenderError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// PNG file signature.
const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

type Palette = Vec<[u8; 4]>;

/// Encode a resolved image, picking indexed or RGBA output automatically.
pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>> {
    create_png_auto(&image.to_rgba_bytes(), image.width, image.height)
}

/// Encode and write a resolved image to `path`.
pub fn write_png(image: &RasterImage, path: impl AsRef<Path>) -> Result<()> {
    let bytes = encode_png(image)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Create a PNG from RGBA bytes, indexed when the palette fits.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels, width, height)?;
    match extract_palette(pixels) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

fn check_len(pixels: &[u8], width: usize, height: usize) -> Result<()> {
    if pixels.len() != width * height * 4 {
        return Err(RenderError::Png(format!(
            "expected {} bytes for {}x{} RGBA, got {}",
            width * height * 4,
            width,
            height,
            pixels.len()
        )));
    }
    Ok(())
}

/// Palette and per-pixel indices, or `None` past 256 colors.
fn extract_palette(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let mut color_to_index: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let color = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let index = match color_to_index.get(&color) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push(color);
                color_to_index.insert(color, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS only if any entry is not opaque
    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create an RGBA PNG (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    check_len(pixels, width, height)?;

    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let idat = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each `stride`-byte row with filter type 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], stride: usize, height: usize) -> Result<Vec<u8>> {
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for row in data.chunks_exact(stride.max(1)).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&uncompressed)
        .map_err(|e| RenderError::Png(format!("IDAT compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| RenderError::Png(format!("IDAT compression failed: {}", e)))
}
