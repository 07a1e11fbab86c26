//! Render configuration.

use crate::error::{RenderError, Result};
use dem_common::Rgba;
use projection::ProjectionKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How tiles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Build and rasterize each tile on the calling thread.
    Direct,
    /// Submit tiles to the concurrent stage pipeline.
    #[default]
    Pipelined,
}

impl RenderMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "direct" => Self::Direct,
            _ => Self::Pipelined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Pipelined => "pipelined",
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// View transform applied by the projector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Pitch about the X axis, degrees.
    pub rotate_x: f64,
    /// Yaw about the Y axis, degrees.
    pub rotate_y: f64,
    /// Horizontal shift as a fraction of the canvas width.
    pub shift_x: f64,
    /// Vertical shift as a fraction of the canvas height.
    pub shift_y: f64,
    /// Depth shift. Accepted but not applied.
    pub shift_z: f64,
    /// Uniform scale factor.
    pub zoom: f64,
    /// Camera orientation angles (x, y, z), degrees. Accepted but held at identity.
    pub camera_orientation: [f64; 3],
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            rotate_x: 30.0,
            rotate_y: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            shift_z: 0.0,
            zoom: 1.0,
            camera_orientation: [0.0; 3],
        }
    }
}

impl ProjectionOptions {
    /// No rotation, no shift, unit zoom. The terrain is seen edge-on.
    pub fn flat() -> Self {
        Self {
            rotate_x: 0.0,
            ..Self::default()
        }
    }

    /// Looking straight down: north up, east right, higher ground nearer.
    pub fn top_down() -> Self {
        Self {
            rotate_x: 90.0,
            ..Self::default()
        }
    }
}

/// Configuration for a render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Requested output width in pixels (the longer data axis keeps it).
    pub width: usize,

    /// Requested output height in pixels.
    pub height: usize,

    /// Subpixel samples per pixel edge (antialiasing factor).
    pub subpixel_width: usize,

    /// Fragments kept per subpixel sample.
    pub pixel_stack_depth: usize,

    /// Tile edge length in grid cells.
    pub tile_size: usize,

    /// Color every sample resolves over.
    pub background: Rgba,

    /// Vertical exaggeration.
    pub elevation_multiple: f64,

    pub mode: RenderMode,

    /// 2-D map projection used before the view transform.
    pub map_projection: ProjectionKind,

    /// Pixel rows per framebuffer lock band.
    pub band_rows: usize,

    /// How long an idle stage waits for work before re-checking its state.
    pub idle_poll_ms: u64,

    /// Upper bound on waiting for the pipeline to drain and stop.
    pub stop_timeout_ms: u64,

    /// Draw a latitude/longitude graticule under the terrain.
    pub paint_base_grid: bool,

    pub projection: ProjectionOptions,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            subpixel_width: 2,
            pixel_stack_depth: 4,
            tile_size: 100,
            background: Rgba::TRANSPARENT,
            elevation_multiple: 1.0,
            mode: RenderMode::Pipelined,
            map_projection: ProjectionKind::Equirectangular,
            band_rows: 16,
            idle_poll_ms: 5,
            stop_timeout_ms: 30_000,
            paint_base_grid: false,
            projection: ProjectionOptions::default(),
        }
    }
}

impl RenderConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DEM_SUBPIXEL_WIDTH") {
            if let Ok(v) = val.parse() {
                config.subpixel_width = v;
            }
        }

        if let Ok(val) = std::env::var("DEM_PIXEL_STACK_DEPTH") {
            if let Ok(v) = val.parse() {
                config.pixel_stack_depth = v;
            }
        }

        if let Ok(val) = std::env::var("DEM_TILE_SIZE") {
            if let Ok(v) = val.parse() {
                config.tile_size = v;
            }
        }

        if let Ok(val) = std::env::var("DEM_RENDER_MODE") {
            config.mode = RenderMode::from_str(&val);
        }

        if let Ok(val) = std::env::var("DEM_STOP_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                config.stop_timeout_ms = v;
            }
        }

        config
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::config("width and height must be > 0"));
        }
        if self.subpixel_width == 0 {
            return Err(RenderError::config("subpixel_width must be > 0"));
        }
        if self.pixel_stack_depth == 0 || self.pixel_stack_depth > u16::MAX as usize {
            return Err(RenderError::config("pixel_stack_depth must be 1-65535"));
        }
        if self.tile_size < 2 {
            return Err(RenderError::config("tile_size must be >= 2"));
        }
        if self.band_rows == 0 {
            return Err(RenderError::config("band_rows must be > 0"));
        }
        if !(self.projection.zoom > 0.0) {
            return Err(RenderError::config("zoom must be > 0"));
        }
        if !self.elevation_multiple.is_finite() {
            return Err(RenderError::config("elevation_multiple must be finite"));
        }
        Ok(())
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
