//! Tile driver: walks the render extent tile by tile and produces the image.

use crate::canvas::{Canvas, RasterImage};
use crate::config::{RenderConfig, RenderMode};
use crate::error::{RenderError, Result};
use crate::orchestrator::PipelineOrchestrator;
use crate::overlay::base_grid;
use crate::pipeline::Pipeline;
use crate::projector::Projector;
use crate::stage::{StageStats, WorkHandler};
use crate::stages::RenderContext;
use crate::tile::TileLayout;
use crate::work::{ShapeFillJob, TileJob};
use dem_common::{BoundingBox, ElevationGrid, LatLonResolution, ModelDimensions};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Notified after every tile with the canvas and the fraction of tiles done.
pub trait TileCompletionListener: Send {
    fn on_tile_completed(&self, canvas: &Canvas, fraction: f64);
}

impl<F> TileCompletionListener for F
where
    F: Fn(&Canvas, f64) + Send,
{
    fn on_tile_completed(&self, canvas: &Canvas, fraction: f64) {
        self(canvas, fraction)
    }
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct HandleInner {
    state: Mutex<ControlState>,
    changed: Condvar,
    orchestrator: Mutex<Option<Arc<PipelineOrchestrator>>>,
}

/// Pause, resume or cancel a render from another thread.
///
/// Requests reach the driver loop between tiles and, in pipelined mode, all
/// four stages between items.
#[derive(Debug, Clone, Default)]
pub struct RenderHandle {
    inner: Arc<HandleInner>,
}

impl RenderHandle {
    fn state(&self) -> MutexGuard<'_, ControlState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn orchestrator(&self) -> Option<Arc<PipelineOrchestrator>> {
        self.inner
            .orchestrator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route later requests to `orchestrator`. The state lock is held until
    /// it is stored, so no request falls between the two.
    fn attach(&self, orchestrator: Arc<PipelineOrchestrator>) {
        let state = self.state();
        if state.cancelled {
            orchestrator.cancel();
        } else if state.paused {
            if let Err(e) = orchestrator.pause() {
                debug!(error = %e, "Could not pause stages");
            }
        }
        *self
            .inner
            .orchestrator
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(orchestrator);
        drop(state);
    }

    fn detach(&self) {
        self.inner
            .orchestrator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn pause(&self) {
        let mut state = self.state();
        if state.cancelled {
            return;
        }
        state.paused = true;
        drop(state);
        if let Some(orchestrator) = self.orchestrator() {
            if let Err(e) = orchestrator.pause() {
                debug!(error = %e, "Could not pause stages");
            }
        }
        info!("Render paused");
    }

    pub fn resume(&self) {
        let mut state = self.state();
        state.paused = false;
        self.inner.changed.notify_all();
        drop(state);
        if let Some(orchestrator) = self.orchestrator() {
            if let Err(e) = orchestrator.resume() {
                debug!(error = %e, "Could not resume stages");
            }
        }
        info!("Render resumed");
    }

    /// Stop submitting tiles. Work already queued is still drained.
    pub fn cancel(&self) {
        let mut state = self.state();
        state.cancelled = true;
        state.paused = false;
        self.inner.changed.notify_all();
        drop(state);
        if let Some(orchestrator) = self.orchestrator() {
            orchestrator.cancel();
        }
        info!("Render cancelled");
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().cancelled
    }

    /// Block while paused. Returns true if the render was cancelled.
    fn checkpoint(&self) -> bool {
        let state = self.state();
        let state = self
            .inner
            .changed
            .wait_while(state, |s| s.paused && !s.cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        state.cancelled
    }
}

/// Summary of a finished render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub mode: &'static str,
    pub width: usize,
    pub height: usize,
    /// Tiles in the layout.
    pub tile_count: usize,
    /// Tiles submitted before the render ended.
    pub tiles_submitted: usize,
    /// Tiles whose strips were built.
    pub tiles_built: u64,
    /// Tiles aborted by a projection error.
    pub failed_tiles: u64,
    pub strips: u64,
    pub paths: u64,
    pub shapes: u64,
    pub fragments_written: u64,
    pub dropped_fragments: u64,
    pub stages: Vec<StageStats>,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct RenderOutput {
    pub image: RasterImage,
    pub report: RenderReport,
}

pub struct TileDriver {
    config: RenderConfig,
    grid: Arc<dyn ElevationGrid>,
    bounds: BoundingBox,
    listeners: Vec<Box<dyn TileCompletionListener>>,
    shapes: Vec<ShapeFillJob>,
    handle: RenderHandle,
}

impl std::fmt::Debug for TileDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileDriver")
            .field("config", &self.config)
            .field("bounds", &self.bounds)
            .field("listeners", &self.listeners.len())
            .field("shapes", &self.shapes.len())
            .finish_non_exhaustive()
    }
}

impl TileDriver {
    /// Render the whole grid extent with `config`.
    pub fn new(config: RenderConfig, grid: Arc<dyn ElevationGrid>) -> Self {
        let bounds = grid.bounds();
        Self {
            config,
            grid,
            bounds,
            listeners: Vec::new(),
            shapes: Vec::new(),
            handle: RenderHandle::default(),
        }
    }

    /// Restrict rendering to `bounds`.
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn add_listener(&mut self, listener: impl TileCompletionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Draw a vector shape along with the terrain.
    pub fn add_shape(&mut self, shape: ShapeFillJob) {
        self.shapes.push(shape);
    }

    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn resolution(&self) -> LatLonResolution {
        let (latitude, longitude) = self.grid.resolution();
        LatLonResolution {
            latitude,
            longitude,
        }
    }

    pub fn dimensions(&self) -> Result<ModelDimensions> {
        Ok(ModelDimensions::compute(
            self.bounds,
            self.resolution(),
            self.config.width,
            self.config.height,
            self.config.tile_size,
        )?)
    }

    pub fn tile_layout(&self) -> TileLayout {
        TileLayout::new(self.bounds, self.resolution(), self.config.tile_size)
    }

    fn notify(&self, canvas: &Canvas, fraction: f64) {
        for listener in &self.listeners {
            listener.on_tile_completed(canvas, fraction);
        }
    }

    /// Render every tile and resolve the image.
    pub fn render(&self) -> Result<RenderOutput> {
        let started = Instant::now();
        self.config.validate()?;
        if !self.bounds.is_valid() {
            return Err(RenderError::config(format!("invalid bounds {:?}", self.bounds)));
        }

        let dims = self.dimensions()?;
        let canvas = Arc::new(Canvas::new(
            dims.output_width,
            dims.output_height,
            self.config.subpixel_width,
            self.config.pixel_stack_depth,
            self.config.band_rows,
            self.config.background,
        )?);

        let map = self.config.map_projection.build(
            self.bounds,
            dims.output_width as f64,
            dims.output_height as f64,
        )?;
        let projector = Projector::for_model(
            map,
            &dims,
            self.grid.elevation_range(),
            self.config.elevation_multiple,
            &self.config.projection,
        );

        let step = LatLonResolution {
            latitude: dims.resolution.latitude.max(dims.output_resolution.latitude),
            longitude: dims.resolution.longitude.max(dims.output_resolution.longitude),
        };
        let context = Arc::new(RenderContext::new(
            Arc::clone(&canvas),
            projector,
            Arc::clone(&self.grid),
            step,
        ));

        let layout = self.tile_layout();
        let mut shapes = Vec::new();
        if self.config.paint_base_grid {
            shapes.extend(base_grid(&self.bounds, self.grid.elevation_range().0));
        }
        shapes.extend(self.shapes.iter().cloned());

        info!(
            mode = %self.config.mode,
            width = dims.output_width,
            height = dims.output_height,
            tiles = layout.tile_count(),
            shapes = shapes.len(),
            "Starting render"
        );

        let (tiles_submitted, stages) = match self.config.mode {
            RenderMode::Direct => (self.render_direct(&context, &layout, &shapes), Vec::new()),
            RenderMode::Pipelined => self.render_pipelined(&context, &layout, shapes)?,
        };

        let image = canvas.resolve();
        let counters = &context.counters;
        let report = RenderReport {
            mode: self.config.mode.as_str(),
            width: image.width,
            height: image.height,
            tile_count: layout.tile_count(),
            tiles_submitted,
            tiles_built: counters.tiles.load(Ordering::Relaxed),
            failed_tiles: counters.failed_tiles.load(Ordering::Relaxed),
            strips: counters.strips.load(Ordering::Relaxed),
            paths: counters.paths.load(Ordering::Relaxed),
            shapes: counters.shapes.load(Ordering::Relaxed),
            fragments_written: canvas.written_fragments(),
            dropped_fragments: canvas.dropped_fragments(),
            stages,
            elapsed_ms: started.elapsed().as_millis() as u64,
            cancelled: self.handle.is_cancelled(),
        };

        info!(
            tiles = report.tiles_built,
            failed = report.failed_tiles,
            strips = report.strips,
            elapsed_ms = report.elapsed_ms,
            cancelled = report.cancelled,
            "Render finished"
        );

        Ok(RenderOutput { image, report })
    }

    fn render_direct(
        &self,
        context: &RenderContext,
        layout: &TileLayout,
        shapes: &[ShapeFillJob],
    ) -> usize {
        for shape in shapes {
            if let Err(e) = context.fill_shape(shape) {
                warn!(error = %e, "Skipping shape");
            }
        }

        let count = layout.tile_count();
        let mut submitted = 0;
        for tile in layout.tiles() {
            if self.handle.checkpoint() {
                break;
            }
            debug!(tile = tile.index + 1, of = count, row = tile.row, column = tile.column, "Rendering tile");
            context.render_tile_direct(&tile);
            submitted += 1;
            self.notify(&context.canvas, submitted as f64 / count as f64);
        }
        submitted
    }

    fn render_pipelined(
        &self,
        context: &Arc<RenderContext>,
        layout: &TileLayout,
        shapes: Vec<ShapeFillJob>,
    ) -> Result<(usize, Vec<StageStats>)> {
        let pipeline = Arc::new(Pipeline::new());
        let handler: Arc<dyn WorkHandler> = Arc::clone(context) as Arc<dyn WorkHandler>;
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::clone(&pipeline),
            handler,
            self.config.idle_poll(),
            self.config.stop_timeout(),
        ));

        orchestrator.start()?;
        self.handle.attach(Arc::clone(&orchestrator));

        for shape in shapes {
            pipeline.enqueue(shape);
        }

        let count = layout.tile_count();
        let mut submitted = 0;
        for tile in layout.tiles() {
            if self.handle.checkpoint() {
                break;
            }
            debug!(tile = tile.index + 1, of = count, row = tile.row, column = tile.column, "Submitting tile");
            if !pipeline.enqueue(TileJob { tile }) {
                break;
            }
            submitted += 1;
            self.notify(&context.canvas, submitted as f64 / count as f64);
        }

        // One budget covers both the drain and the stop.
        let deadline = Instant::now() + self.config.stop_timeout();
        if !orchestrator.wait_until_drained(deadline.saturating_duration_since(Instant::now())) {
            warn!("Pipeline still busy after the stop timeout; stopping anyway");
        }
        let stopped = orchestrator.stop_by(deadline);
        self.handle.detach();
        stopped?;

        Ok((submitted, orchestrator.stats()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageState;
    use crate::work::{WorkItem, WorkKind};
    use std::time::Duration;

    struct Idle;

    impl WorkHandler for Idle {
        fn process(&self, _item: WorkItem, _pipeline: &Pipeline) -> Result<()> {
            Ok(())
        }
    }

    fn orchestrator() -> Arc<PipelineOrchestrator> {
        Arc::new(PipelineOrchestrator::new(
            Arc::new(Pipeline::new()),
            Arc::new(Idle),
            Duration::from_millis(1),
            Duration::from_secs(5),
        ))
    }

    fn states(orchestrator: &PipelineOrchestrator) -> Vec<StageState> {
        WorkKind::ALL
            .iter()
            .map(|&kind| orchestrator.control(kind).state())
            .collect()
    }

    #[test]
    fn test_attach_applies_earlier_pause() {
        let handle = RenderHandle::default();
        handle.pause();

        let orchestrator = orchestrator();
        handle.attach(Arc::clone(&orchestrator));
        assert!(states(&orchestrator).iter().all(|&s| s == StageState::Paused));
    }

    #[test]
    fn test_requests_after_attach_reach_stages() {
        let handle = RenderHandle::default();
        let orchestrator = orchestrator();
        handle.attach(Arc::clone(&orchestrator));

        handle.pause();
        assert!(states(&orchestrator).iter().all(|&s| s == StageState::Paused));
        handle.resume();
        assert!(states(&orchestrator).iter().all(|&s| s == StageState::Running));

        handle.detach();
        handle.pause();
        assert!(states(&orchestrator).iter().all(|&s| s == StageState::Running));
    }

    #[test]
    fn test_concurrent_pause_during_attach_is_not_lost() {
        for _ in 0..50 {
            let handle = RenderHandle::default();
            let orchestrator = orchestrator();

            let pauser = {
                let handle = handle.clone();
                std::thread::spawn(move || handle.pause())
            };
            handle.attach(Arc::clone(&orchestrator));
            pauser.join().unwrap();

            assert!(states(&orchestrator).iter().all(|&s| s == StageState::Paused));
        }
    }
}
