//! What each stage does with its items.
//!
//! [`RenderContext`] bundles everything a stage needs to turn an item into
//! fragments: the shared canvas, the projector, the elevation grid and the
//! sampling step. The same context serves the direct (single-threaded) path,
//! which calls the per-kind methods itself instead of going through queues.

use crate::canvas::Canvas;
use crate::error::Result;
use crate::geometry::{Line, ScanlinePath, TriangleStrip};
use crate::pipeline::Pipeline;
use crate::projector::Projector;
use crate::raster::{draw_line, fill_path, fill_strip};
use crate::stage::WorkHandler;
use crate::tile::{Tile, TileBuilder};
use crate::work::{
    ScanlinePathFillJob, Shape, ShapeFillJob, TileJob, TriangleStripFillJob, WorkItem,
};
use dem_common::{ElevationGrid, LatLonResolution};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Running totals across all stages.
#[derive(Debug, Default)]
pub struct RenderCounters {
    pub tiles: AtomicU64,
    pub failed_tiles: AtomicU64,
    pub strips: AtomicU64,
    pub paths: AtomicU64,
    pub shapes: AtomicU64,
}

pub struct RenderContext {
    pub canvas: Arc<Canvas>,
    pub projector: Projector,
    pub grid: Arc<dyn ElevationGrid>,
    /// Grid sampling step used to build strips.
    pub step: LatLonResolution,
    pub counters: RenderCounters,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("projector", &self.projector)
            .field("step", &self.step)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    pub fn new(
        canvas: Arc<Canvas>,
        projector: Projector,
        grid: Arc<dyn ElevationGrid>,
        step: LatLonResolution,
    ) -> Self {
        Self {
            canvas,
            projector,
            grid,
            step,
            counters: RenderCounters::default(),
        }
    }

    /// Build a tile's strips and hand each to `emit`. A projection failure
    /// aborts the tile and is counted, not propagated.
    fn build_tile<F>(&self, tile: &Tile, emit: F) -> usize
    where
        F: FnMut(TriangleStrip),
    {
        let builder = TileBuilder::new(self.grid.as_ref(), &self.projector, self.step);
        match builder.build(tile, emit) {
            Ok(strips) => {
                self.counters.tiles.fetch_add(1, Ordering::Relaxed);
                debug!(tile = tile.index, strips, "Built tile");
                strips
            }
            Err(e) => {
                self.counters.failed_tiles.fetch_add(1, Ordering::Relaxed);
                warn!(tile = tile.index, error = %e, "Aborting tile");
                0
            }
        }
    }

    /// Build and rasterize a tile on the calling thread.
    pub fn render_tile_direct(&self, tile: &Tile) -> usize {
        self.build_tile(tile, |strip| {
            self.fill_strip(&TriangleStripFillJob {
                tile: Some(tile.index),
                strip,
            });
        })
    }

    /// Build a tile and queue its strips for the strip stage.
    pub fn process_tile(&self, job: &TileJob, pipeline: &Pipeline) -> usize {
        let index = job.tile.index;
        self.build_tile(&job.tile, |strip| {
            pipeline.enqueue(TriangleStripFillJob {
                tile: Some(index),
                strip,
            });
        })
    }

    pub fn fill_strip(&self, job: &TriangleStripFillJob) -> usize {
        self.counters.strips.fetch_add(1, Ordering::Relaxed);
        fill_strip(&self.canvas, &job.strip)
    }

    pub fn fill_path(&self, job: &ScanlinePathFillJob) -> usize {
        self.counters.paths.fetch_add(1, Ordering::Relaxed);
        fill_path(&self.canvas, &job.path, job.fill)
    }

    /// Project a shape and draw it: polygons are filled, polylines stroked.
    pub fn fill_shape(&self, job: &ShapeFillJob) -> Result<usize> {
        let kept = match &job.shape {
            Shape::Polygon { rings } => {
                let mut path = ScanlinePath::new();
                for ring in rings {
                    path.begin_contour();
                    for p in ring {
                        path.add_vertex(self.projector.vertex(
                            p.latitude,
                            p.longitude,
                            p.elevation,
                            job.color,
                        )?);
                    }
                }
                fill_path(&self.canvas, &path, Some(job.color))
            }
            Shape::Polyline { points } => {
                let vertices = points
                    .iter()
                    .map(|p| self.projector.vertex(p.latitude, p.longitude, p.elevation, job.color))
                    .collect::<Result<Vec<_>>>()?;
                draw_line(&self.canvas, &Line::from_points(&vertices))
            }
        };
        self.counters.shapes.fetch_add(1, Ordering::Relaxed);
        Ok(kept)
    }
}

impl WorkHandler for RenderContext {
    fn process(&self, item: WorkItem, pipeline: &Pipeline) -> Result<()> {
        match item {
            WorkItem::Tile(job) => {
                self.process_tile(&job, pipeline);
            }
            WorkItem::TriangleStripFill(job) => {
                self.fill_strip(&job);
            }
            WorkItem::ScanlinePathFill(job) => {
                self.fill_path(&job);
            }
            WorkItem::ShapeFill(job) => {
                self.fill_shape(&job)?;
            }
        }
        Ok(())
    }
}
