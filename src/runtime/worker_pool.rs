// src/runtime/worker_pool.rs
//! Fixed-size worker pool and per-worker dispatch loop
//!
//! Exactly `max_concurrent_tasks` workers run for the lifetime of the
//! runtime (not elastic): throughput is capped and back-pressure shows up as
//! queue growth rather than unbounded spawning. Each worker owns the tasks
//! it dequeues exclusively; a task error never unwinds the loop.
//!
//! Dispatch order per task: claim (`Running`) → circuit breaker consult →
//! cache lookup → `process_task` → breaker/cache bookkeeping → terminal
//! status and result delivery. Equal-fingerprint tasks arriving while one is
//! being computed wait for the leader and are served from the cache it
//! populates, so a burst of identical tasks invokes `process_task` once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::observability::RuntimeMetrics;
use crate::runtime::agent_runtime::Agent;
use crate::runtime::circuit_breaker::CircuitBreaker;
use crate::runtime::queue::{QueuedTask, TaskQueue};
use crate::runtime::result_cache::ResultCache;
use crate::runtime::task::TaskStatus;
use crate::utils::errors::EngineError;

/// Shared state every worker dispatches against
pub(crate) struct WorkerContext {
    pub agent_id: String,
    pub agent: Arc<dyn Agent>,
    pub queue: Arc<TaskQueue>,
    pub cache: Option<Arc<ResultCache>>,
    pub breaker: Option<Arc<CircuitBreaker>>,

    /// Ids of tasks that are not yet terminal (duplicate detection)
    pub active: Arc<DashMap<String, ()>>,

    /// In-flight computation markers for cache coalescing; the receiver
    /// resolves (sender dropped) when the leading computation finishes
    pub inflight: DashMap<String, watch::Receiver<()>>,

    pub metrics: Arc<RuntimeMetrics>,
}

/// Role of a worker relative to an equal-fingerprint computation in flight
enum FlightRole {
    Leader(watch::Sender<()>),
    Follower(watch::Receiver<()>),
}

/// Fixed set of long-lived worker tasks
pub struct WorkerPool {
    handles: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers against the shared context
    pub(crate) fn start(
        size: usize,
        ctx: Arc<WorkerContext>,
        shutdown: CancellationToken,
    ) -> Self {
        let handles = (0..size)
            .map(|worker_id| {
                let ctx = Arc::clone(&ctx);
                let token = shutdown.clone();
                tokio::spawn(worker_loop(worker_id, ctx, token))
            })
            .collect();

        info!(workers = size, "worker pool started");

        Self {
            handles: Mutex::new(handles),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for all workers to exit, aborting any that outlive `timeout`
    ///
    /// Abandoned in-flight tasks are force-aborted; their handles resolve to
    /// `EngineError::Cancelled`. When this returns, no worker is running.
    pub(crate) async fn join(&self, timeout: Duration) {
        let handles = std::mem::take(&mut *self.handles.lock());
        let deadline = Instant::now() + timeout;

        for mut handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                warn!("shutdown grace period elapsed, aborting worker");
                handle.abort();
                // Wait for the abort to take effect; the JoinError is the
                // expected cancellation outcome.
                let _ = handle.await;
            }
        }
    }
}

/// One worker: pop tasks until the shutdown token cancels the wait
async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>, shutdown: CancellationToken) {
    debug!(worker_id, "worker started");

    while let Some(entry) = ctx.queue.pop(&shutdown).await {
        execute_one(worker_id, &ctx, entry).await;
    }

    debug!(worker_id, "worker exited");
}

/// Execute a single dequeued task; never panics on task failure
async fn execute_one(worker_id: usize, ctx: &WorkerContext, entry: QueuedTask) {
    let task_id = entry.task.id.clone();
    trace!(worker_id, task_id = %task_id, "task claimed");
    entry.set_status(TaskStatus::Running);

    // Breaker consult: open means fast-fail without invoking the agent
    if let Some(breaker) = &ctx.breaker {
        if !breaker.try_acquire() {
            debug!(task_id = %task_id, "short-circuited by open circuit breaker");
            ctx.metrics.record_short_circuited();
            ctx.active.remove(&task_id);
            entry.fail(EngineError::CircuitOpen {
                agent_id: ctx.agent_id.clone(),
            });
            return;
        }
    }

    let fingerprint = ctx.cache.as_ref().map(|_| entry.task.fingerprint());

    // Cache lookup, with coalescing of concurrent equal-fingerprint tasks
    let mut flight: Option<FlightRole> = None;
    if let (Some(cache), Some(fp)) = (&ctx.cache, &fingerprint) {
        if let Some(result) = cache.get(fp) {
            complete_from_cache(ctx, entry, result);
            return;
        }

        flight = Some(match ctx.inflight.entry(fp.clone()) {
            Entry::Occupied(e) => FlightRole::Follower(e.get().clone()),
            Entry::Vacant(v) => {
                let (tx, rx) = watch::channel(());
                v.insert(rx);
                FlightRole::Leader(tx)
            }
        });

        if let Some(FlightRole::Follower(rx)) = &flight {
            let mut rx = rx.clone();
            trace!(task_id = %task_id, "waiting on in-flight equal-fingerprint task");
            // Resolves when the leader drops its sender (success or failure)
            let _ = rx.changed().await;

            if let Some(result) = cache.get(fp) {
                complete_from_cache(ctx, entry, result);
                return;
            }
            // Leader failed; fall through and invoke the agent ourselves
        }
    }

    let started = Instant::now();
    let outcome = ctx.agent.process_task(&entry.task).await;
    let is_leader = matches!(flight, Some(FlightRole::Leader(_)));

    match outcome {
        Ok(result) => {
            if let Some(breaker) = &ctx.breaker {
                breaker.record_success();
            }
            if let (Some(cache), Some(fp)) = (&ctx.cache, &fingerprint) {
                cache.insert(fp.clone(), result.clone());
                if is_leader {
                    // Marker comes out only after the insert, so a task that
                    // misses the marker is guaranteed to hit the cache
                    ctx.inflight.remove(fp);
                }
            }
            let latency = started.elapsed();
            trace!(worker_id, task_id = %task_id, latency_ms = latency.as_millis() as u64, "task completed");
            ctx.metrics.record_completed(latency);
            ctx.active.remove(&task_id);
            entry.complete(result);
        }
        Err(e) => {
            if let Some(breaker) = &ctx.breaker {
                breaker.record_failure();
            }
            if let Some(fp) = &fingerprint {
                if is_leader {
                    ctx.inflight.remove(fp);
                }
            }
            warn!(worker_id, task_id = %task_id, error = %e, "task processing failed");
            ctx.metrics.record_failed();
            ctx.active.remove(&task_id);

            let error = match e {
                EngineError::Processing(msg) => EngineError::Processing(msg),
                other => EngineError::Processing(other.to_string()),
            };
            entry.fail(error);
        }
    }
}

/// Complete a task from a cached result, releasing any claimed probe slot
fn complete_from_cache(ctx: &WorkerContext, entry: QueuedTask, result: serde_json::Value) {
    if let Some(breaker) = &ctx.breaker {
        breaker.cancel_probe();
    }
    ctx.metrics.record_completed(Duration::ZERO);
    ctx.active.remove(&entry.task.id);
    entry.complete(result);
}
