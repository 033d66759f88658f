// src/runtime/queue.rs
//! Shared task queue feeding the worker pool
//!
//! Priority-ordered (lower [`TaskPriority`] first), FIFO within a priority
//! level via a monotonic submission sequence. The queue is unbounded:
//! back-pressure is applied by queue growth, and callers needing admission
//! control reject at submission based on the exposed depth.
//!
//! Waiting for work is cancellation-aware: `pop` suspends on `Notify` and
//! wakes on new submissions or on the runtime's shutdown token, so idle
//! workers exit promptly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::runtime::task::{Task, TaskStatus};
use crate::utils::errors::{EngineError, Result};

/// A task staged for dispatch, owning its status and result channels
///
/// Ownership of a dequeued entry is exclusive to the worker that popped it;
/// the shutdown path only touches entries still in the queue.
pub struct QueuedTask {
    /// The immutable task description
    pub task: Task,

    /// Submission sequence, assigned at push time (FIFO tie-break)
    seq: u64,

    /// Enqueue timestamp, for latency measurement
    pub enqueued_at: Instant,

    status_tx: watch::Sender<TaskStatus>,
    result_tx: oneshot::Sender<Result<serde_json::Value>>,
}

impl QueuedTask {
    pub fn new(
        task: Task,
        status_tx: watch::Sender<TaskStatus>,
        result_tx: oneshot::Sender<Result<serde_json::Value>>,
    ) -> Self {
        Self {
            task,
            seq: 0,
            enqueued_at: Instant::now(),
            status_tx,
            result_tx,
        }
    }

    /// Advance the observable status; the handle may already be dropped
    pub fn set_status(&self, status: TaskStatus) {
        let _ = self.status_tx.send(status);
    }

    /// Record successful completion and deliver the result
    pub fn complete(self, result: serde_json::Value) {
        self.set_status(TaskStatus::Completed);
        let _ = self.result_tx.send(Ok(result));
    }

    /// Record failure and deliver the error to the awaiting caller
    pub fn fail(self, error: EngineError) {
        self.set_status(TaskStatus::Failed);
        let _ = self.result_tx.send(Err(error));
    }

    /// Mark cancelled without invoking the agent (shutdown drain)
    pub fn cancel(self) {
        let task_id = self.task.id.clone();
        self.set_status(TaskStatus::Cancelled);
        let _ = self.result_tx.send(Err(EngineError::Cancelled(task_id)));
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum, so invert: lower priority value and
        // lower sequence number compare as greater.
        (other.task.priority, other.seq).cmp(&(self.task.priority, self.seq))
    }
}

/// Unbounded, priority-then-FIFO task queue
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    notify: Notify,
    seq: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Enqueue a task and wake one idle worker
    pub fn push(&self, mut entry: QueuedTask) {
        entry.seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        trace!(task_id = %entry.task.id, seq = entry.seq, "task enqueued");
        self.heap.lock().push(entry);
        self.notify.notify_one();
    }

    /// Dequeue the next task, suspending while the queue is empty
    ///
    /// Returns `None` once the shutdown token is cancelled and no claim was
    /// made; after cancellation no further tasks are handed out.
    pub async fn pop(&self, shutdown: &CancellationToken) -> Option<QueuedTask> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            if let Some(entry) = self.heap.lock().pop() {
                return Some(entry);
            }

            // Register interest before the re-check so a push between the
            // check and the await leaves a stored permit.
            let notified = self.notify.notified();

            if let Some(entry) = self.heap.lock().pop() {
                return Some(entry);
            }

            tokio::select! {
                _ = notified => {}
                _ = shutdown.cancelled() => return None,
            }
        }
    }

    /// Remove and return all queued entries (shutdown drain)
    pub fn drain(&self) -> Vec<QueuedTask> {
        self.heap.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
