//! Stage lifecycle and the worker loop.
//!
//! ```text
//!   Running <──> Paused
//!      │           │
//!      └──> Cancelled <──┘
//!              │
//!          Completed
//! ```
//!
//! Pause is cooperative: it is honoured between items, never mid-item.
//! Cancel is drain-then-stop: a cancelled stage keeps consuming until its own
//! queue is empty and its inputs are closed, and only then moves to
//! `Completed`. A source stage's input closes when the pipeline stops taking
//! submissions; any other stage's closes when its upstream stages complete.

use crate::error::{RenderError, Result};
use crate::pipeline::Pipeline;
use crate::work::{WorkItem, WorkKind};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StageState {
    Running,
    Paused,
    Cancelled,
    Completed,
}

impl StageState {
    fn can_become(self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Running, Paused)
                | (Paused, Running)
                | (Running, Cancelled)
                | (Paused, Cancelled)
                | (Cancelled, Completed)
        )
    }
}

/// Processes the items a stage takes off its queue.
///
/// Handlers may enqueue follow-up work on `pipeline`; they must do so before
/// returning so the pending counts never drop to zero early.
pub trait WorkHandler: Send + Sync {
    fn process(&self, item: WorkItem, pipeline: &Pipeline) -> Result<()>;
}

/// Shared lifecycle state and counters of one stage.
#[derive(Debug)]
pub struct StageControl {
    kind: WorkKind,
    state: Mutex<StageState>,
    changed: Condvar,
    processed: AtomicU64,
    faults: AtomicU64,
}

/// Snapshot of a stage for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub stage: &'static str,
    pub state: StageState,
    pub processed: u64,
    pub faults: u64,
}

impl StageControl {
    pub fn new(kind: WorkKind) -> Self {
        Self {
            kind,
            state: Mutex::new(StageState::Running),
            changed: Condvar::new(),
            processed: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> WorkKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, StageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> StageState {
        *self.lock()
    }

    /// Move to `next` if the lifecycle allows it.
    pub fn transition(&self, next: StageState) -> Result<()> {
        let mut state = self.lock();
        if !state.can_become(next) {
            return Err(RenderError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        debug!(stage = %self.kind, from = ?*state, to = ?next, "Stage transition");
        *state = next;
        self.changed.notify_all();
        Ok(())
    }

    /// Pause a running stage. No-op when already paused.
    pub fn pause(&self) -> Result<()> {
        match self.state() {
            StageState::Paused => Ok(()),
            _ => self.transition(StageState::Paused),
        }
    }

    /// Resume a paused stage. No-op when already running.
    pub fn resume(&self) -> Result<()> {
        match self.state() {
            StageState::Running => Ok(()),
            _ => self.transition(StageState::Running),
        }
    }

    /// Cancel the stage. No-op once cancelled or completed.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if matches!(*state, StageState::Running | StageState::Paused) {
            *state = StageState::Cancelled;
            self.changed.notify_all();
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == StageState::Completed
    }

    /// Block while paused, at most `timeout`. Returns the state afterwards.
    pub fn wait_while_paused(&self, timeout: Duration) -> StageState {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| *s == StageState::Paused)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Block until the stage has completed or `deadline` passes.
    pub fn wait_completed(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        while *state != StageState::Completed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> StageStats {
        StageStats {
            stage: self.kind.name(),
            state: self.state(),
            processed: self.processed(),
            faults: self.faults(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One consumer of one queue.
pub(crate) struct StageWorker {
    pub control: Arc<StageControl>,
    pub upstream: Vec<Arc<StageControl>>,
    pub pipeline: Arc<Pipeline>,
    pub handler: Arc<dyn WorkHandler>,
    pub idle_poll: Duration,
}

impl StageWorker {
    fn inputs_closed(&self) -> bool {
        if self.upstream.is_empty() {
            self.pipeline.is_closed()
        } else {
            self.upstream.iter().all(|c| c.is_completed())
        }
    }

    fn run_item(&self, item: WorkItem) {
        let kind = self.control.kind;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.handler.process(item, &self.pipeline)
        }));

        match outcome {
            Ok(Ok(())) => {
                self.control.processed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.control.faults.fetch_add(1, Ordering::Relaxed);
                error!(stage = %kind, error = %e, "Work item failed");
            }
            Err(payload) => {
                self.control.faults.fetch_add(1, Ordering::Relaxed);
                let fault = RenderError::stage_fault(kind.name(), panic_message(payload.as_ref()));
                error!(stage = %kind, error = %fault, "Work item panicked");
            }
        }

        self.pipeline.finish(kind);
    }

    /// Consume the stage's queue until the stage completes.
    pub fn run(self) {
        let kind = self.control.kind;
        info!(stage = %kind, "Stage started");

        loop {
            match self.control.state() {
                StageState::Completed => break,
                StageState::Paused => {
                    self.control.wait_while_paused(self.idle_poll);
                    continue;
                }
                StageState::Running | StageState::Cancelled => {}
            }

            if let Some(item) = self.pipeline.take(kind, self.idle_poll) {
                self.run_item(item);
                continue;
            }

            // Inputs are checked first: once closed nothing new can arrive,
            // so an empty queue stays empty.
            if self.control.state() == StageState::Cancelled
                && self.inputs_closed()
                && !self.pipeline.has_more(kind)
            {
                if let Err(e) = self.control.transition(StageState::Completed) {
                    error!(stage = %kind, error = %e, "Stage could not complete");
                }
                break;
            }
        }

        info!(
            stage = %kind,
            processed = self.control.processed(),
            faults = self.control.faults(),
            "Stage completed"
        );
    }
}
