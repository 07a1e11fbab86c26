//! Work queues shared by the driver and the stages.
//!
//! One unbounded FIFO queue per [`WorkKind`]. Every queue also tracks a
//! pending count that rises on enqueue and falls only when a stage reports
//! the item finished, so "has more" stays true while an item is in flight.
//! A pipeline-wide counter with a condition variable lets callers block
//! until all work has finished instead of polling.
//!
//! Source queues (tiles and shapes) are fed by the driver. Once submissions
//! are closed they refuse new items, and only then may their stages complete.

use crate::work::{WorkItem, WorkKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

#[derive(Debug, Default)]
struct Queue {
    items: Mutex<VecDeque<WorkItem>>,
    ready: Condvar,
    pending: AtomicUsize,
    enqueued: AtomicU64,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    queues: [Queue; 4],
    outstanding: Mutex<usize>,
    idle: Condvar,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, kind: WorkKind) -> &Queue {
        &self.queues[kind.index()]
    }

    /// Append an item to the queue of its kind.
    ///
    /// Returns false, and drops the item, when it targets a source queue
    /// after [`close_submissions`](Self::close_submissions).
    pub fn enqueue(&self, item: impl Into<WorkItem>) -> bool {
        let item = item.into();
        let kind = item.kind();
        let queue = self.queue(kind);

        // Checked under the queue lock so a close cannot slip in between.
        let mut items = lock(&queue.items);
        if kind.is_source() && self.closed.load(Ordering::SeqCst) {
            drop(items);
            warn!(queue = %kind, "Submissions closed; rejecting work item");
            return false;
        }

        *lock(&self.outstanding) += 1;
        queue.pending.fetch_add(1, Ordering::SeqCst);
        queue.enqueued.fetch_add(1, Ordering::Relaxed);

        items.push_back(item);
        drop(items);
        queue.ready.notify_one();
        trace!(queue = %kind, "Enqueued work item");
        true
    }

    /// Stop accepting work for the source queues. Idempotent.
    pub fn close_submissions(&self) {
        let guards: Vec<_> = self.queues.iter().map(|q| lock(&q.items)).collect();
        let was_closed = self.closed.swap(true, Ordering::SeqCst);
        drop(guards);
        if !was_closed {
            trace!("Submissions closed");
            self.wake_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether `kind` has queued or in-flight items.
    pub fn has_more(&self, kind: WorkKind) -> bool {
        self.queue(kind).pending.load(Ordering::SeqCst) > 0
    }

    /// Queued plus in-flight items of `kind`.
    pub fn pending(&self, kind: WorkKind) -> usize {
        self.queue(kind).pending.load(Ordering::SeqCst)
    }

    /// Items waiting in the queue, not counting in-flight ones.
    pub fn queued(&self, kind: WorkKind) -> usize {
        lock(&self.queue(kind).items).len()
    }

    /// Items ever enqueued for `kind`.
    pub fn enqueued(&self, kind: WorkKind) -> u64 {
        self.queue(kind).enqueued.load(Ordering::Relaxed)
    }

    /// True when no queue has queued or in-flight work.
    pub fn is_empty(&self) -> bool {
        WorkKind::ALL.iter().all(|&kind| !self.has_more(kind))
    }

    /// Take the oldest item of `kind`, waiting up to `timeout` for one.
    ///
    /// The caller must pass the item back through [`finish`](Self::finish).
    pub fn take(&self, kind: WorkKind, timeout: Duration) -> Option<WorkItem> {
        let queue = self.queue(kind);
        let guard = lock(&queue.items);
        let (mut guard, _) = queue
            .ready
            .wait_timeout_while(guard, timeout, |items| items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        guard.pop_front()
    }

    /// Take the oldest item of `kind` without waiting.
    pub fn try_take(&self, kind: WorkKind) -> Option<WorkItem> {
        lock(&self.queue(kind).items).pop_front()
    }

    /// Mark one item of `kind` as done.
    pub fn finish(&self, kind: WorkKind) {
        let queue = self.queue(kind);
        let previous = queue.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "finish without a matching take");

        let mut outstanding = lock(&self.outstanding);
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every queue is empty and nothing is in flight, or until
    /// `timeout` passes. Returns whether the pipeline went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = lock(&self.outstanding);
        while *outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            outstanding = self
                .idle
                .wait_timeout(outstanding, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Wake every stage blocked in [`take`](Self::take).
    pub fn wake_all(&self) {
        for queue in &self.queues {
            // Take the lock so a waiter between its check and its wait is not missed.
            let _guard = lock(&queue.items);
            queue.ready.notify_all();
        }
    }
}
