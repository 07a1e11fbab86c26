//! Depth-composited terrain rendering.
//!
//! Turns an elevation grid into a raster image:
//! - [`Projector`] maps (latitude, longitude, elevation) to canvas x/y and depth
//! - [`Canvas`] holds a subpixel depth buffer and fragment-stack framebuffer,
//!   sharded into lockable bands so stages can write concurrently
//! - [`raster`] scan-converts triangle strips, paths and lines into the canvas
//! - [`Pipeline`], the stage workers and [`PipelineOrchestrator`] run tile
//!   building and filling on four threads
//! - [`TileDriver`] walks the extent tile by tile and resolves the image

pub mod canvas;
pub mod color;
pub mod config;
pub mod depth_buffer;
pub mod driver;
pub mod error;
pub mod framebuffer;
pub mod geometry;
pub mod orchestrator;
pub mod overlay;
pub mod pipeline;
pub mod png;
pub mod projector;
pub mod raster;
pub mod sampling;
pub mod stage;
pub mod stages;
pub mod tile;
pub mod work;

pub use canvas::{Canvas, RasterImage};
pub use config::{ProjectionOptions, RenderConfig, RenderMode};
pub use depth_buffer::DepthBuffer;
pub use driver::{RenderHandle, RenderOutput, RenderReport, TileCompletionListener, TileDriver};
pub use error::{RenderError, Result};
pub use framebuffer::SubpixelFramebuffer;
pub use geometry::{Edge, Line, ScanlinePath, Triangle, TriangleStrip, Vertex};
pub use orchestrator::PipelineOrchestrator;
pub use pipeline::Pipeline;
pub use projector::{Projector, ScreenPoint};
pub use stage::{StageControl, StageState, StageStats, WorkHandler};
pub use stages::RenderContext;
pub use tile::{Tile, TileBuilder, TileLayout};
pub use work::{
    ScanlinePathFillJob, Shape, ShapeFillJob, TileJob, TriangleStripFillJob, WorkItem, WorkKind,
};
