//! Owns the four stage workers and drives them as a unit.

use crate::error::{RenderError, Result};
use crate::pipeline::Pipeline;
use crate::stage::{StageControl, StageState, StageStats, StageWorker, WorkHandler};
use crate::work::WorkKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct PipelineOrchestrator {
    pipeline: Arc<Pipeline>,
    handler: Arc<dyn WorkHandler>,
    controls: Vec<Arc<StageControl>>,
    threads: Mutex<Vec<(WorkKind, JoinHandle<()>)>>,
    started: AtomicBool,
    hung: AtomicBool,
    idle_poll: Duration,
    stop_timeout: Duration,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("stages", &self.stats())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PipelineOrchestrator {
    /// Create the stages for `pipeline`. Nothing runs until [`start`](Self::start).
    ///
    /// `idle_poll` bounds how long an idle stage waits before re-checking its
    /// state; `stop_timeout` bounds [`stop(true)`](Self::stop).
    pub fn new(
        pipeline: Arc<Pipeline>,
        handler: Arc<dyn WorkHandler>,
        idle_poll: Duration,
        stop_timeout: Duration,
    ) -> Self {
        let controls = WorkKind::ALL
            .iter()
            .map(|&kind| Arc::new(StageControl::new(kind)))
            .collect();
        Self {
            pipeline,
            handler,
            controls,
            threads: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            hung: AtomicBool::new(false),
            idle_poll,
            stop_timeout,
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn control(&self, kind: WorkKind) -> &Arc<StageControl> {
        &self.controls[kind.index()]
    }

    /// Spawn one named thread per stage.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Pipeline already started");
            return Ok(());
        }

        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        for &kind in WorkKind::ALL.iter() {
            let worker = StageWorker {
                control: Arc::clone(self.control(kind)),
                upstream: kind
                    .upstream()
                    .iter()
                    .map(|&up| Arc::clone(self.control(up)))
                    .collect(),
                pipeline: Arc::clone(&self.pipeline),
                handler: Arc::clone(&self.handler),
                idle_poll: self.idle_poll,
            };

            let handle = thread::Builder::new()
                .name(format!("stage-{}", kind.name()))
                .spawn(move || worker.run())?;
            threads.push((kind, handle));
        }

        info!(stages = threads.len(), "Pipeline started");
        Ok(())
    }

    /// Pause every stage that is still running.
    pub fn pause(&self) -> Result<()> {
        self.controls.iter().try_for_each(|c| c.pause())
    }

    pub fn resume(&self) -> Result<()> {
        self.controls.iter().try_for_each(|c| c.resume())
    }

    /// Tell every stage to drain its queue and stop.
    ///
    /// Source stages keep taking submissions until [`stop`](Self::stop)
    /// closes them, so work submitted after a cancel is still drained.
    pub fn cancel(&self) {
        for control in &self.controls {
            control.cancel();
        }
        self.pipeline.wake_all();
    }

    /// Close submissions and cancel all stages. With `block`, wait (at most
    /// the stop timeout) for them to complete and join their threads.
    pub fn stop(&self, block: bool) -> Result<()> {
        if !block {
            self.close_and_cancel();
            return Ok(());
        }
        self.stop_by(Instant::now() + self.stop_timeout)
    }

    /// Blocking stop that gives up at `deadline` with [`RenderError::StageHang`].
    ///
    /// Stages still running at the deadline are detached, never joined.
    pub fn stop_by(&self, deadline: Instant) -> Result<()> {
        let started = Instant::now();
        self.close_and_cancel();

        if !self.started.load(Ordering::SeqCst) {
            // No worker will ever drain these queues.
            warn!("Stopping a pipeline that was never started");
            for control in &self.controls {
                if let Err(e) = control.transition(StageState::Completed) {
                    debug!(stage = %control.kind(), error = %e, "Stage already completed");
                }
            }
            return Ok(());
        }

        for control in &self.controls {
            if !control.wait_completed(deadline) {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(stage = %control.kind(), waited_ms, "Stage did not complete in time");
                self.hung.store(true, Ordering::SeqCst);
                self.release_threads(Instant::now());
                return Err(RenderError::StageHang { waited_ms });
            }
        }

        self.release_threads(deadline);
        info!("Pipeline stopped");
        Ok(())
    }

    fn close_and_cancel(&self) {
        self.pipeline.close_submissions();
        self.cancel();
    }

    /// Join the threads of stages that complete by `deadline` and detach
    /// the rest.
    fn release_threads(&self, deadline: Instant) {
        let threads: Vec<(WorkKind, JoinHandle<()>)> = self
            .threads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for (kind, handle) in threads {
            if !self.control(kind).wait_completed(deadline) {
                warn!(stage = %kind, "Detaching stage thread that is still running");
                continue;
            }
            if handle.join().is_err() {
                warn!(stage = %kind, "Stage thread panicked");
            }
        }
    }

    /// True when no queue holds queued or in-flight work.
    pub fn are_queues_empty(&self) -> bool {
        self.pipeline.is_empty()
    }

    pub fn are_all_completed(&self) -> bool {
        self.controls.iter().all(|c| c.is_completed())
    }

    /// Whether tile submission has finished: submissions are closed and the
    /// tile stage has drained its queue and completed.
    pub fn is_tile_process_completed(&self) -> bool {
        self.control(WorkKind::TileProcess).is_completed()
    }

    /// Block until all queued work has finished or `timeout` passes.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        self.pipeline.wait_idle(timeout)
    }

    pub fn stats(&self) -> Vec<StageStats> {
        self.controls.iter().map(|c| c.stats()).collect()
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        let running = !self
            .threads
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        if running {
            self.close_and_cancel();
            // A stop that already reported a hang is not waited out again.
            let deadline = if self.hung.load(Ordering::SeqCst) {
                Instant::now()
            } else {
                Instant::now() + self.stop_timeout
            };
            self.release_threads(deadline);
        }
    }
}
