// src/observability/mod.rs
//! Tracing and metrics setup, plus the runtime's own counters
//!
//! The engine emits structured logs through `tracing` and operational
//! counters through the `metrics` facade. [`RuntimeMetrics`] additionally
//! keeps an in-process snapshot so callers can read queue/task counters
//! without a metrics exporter wired up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

use crate::utils::errors::{EngineError, Result};

/// Initialize the tracing subscriber (env-filtered, default `info`)
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| EngineError::Observability(e.to_string()))
}

/// Install the Prometheus metrics recorder (binary entry points only)
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EngineError::Observability(e.to_string()))
}

/// Per-runtime task counters
///
/// Mirrors every increment to the `metrics` facade so external exporters see
/// the same numbers the in-process snapshot reports.
pub struct RuntimeMetrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_cancelled: AtomicU64,
    tasks_short_circuited: AtomicU64,
    processing_micros: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_cancelled: AtomicU64::new(0),
            tasks_short_circuited: AtomicU64::new(0),
            processing_micros: AtomicU64::new(0),
        }
    }

    pub fn record_submitted(&self, queue_depth: usize) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        counter!("taskmesh_tasks_submitted_total").increment(1);
        gauge!("taskmesh_queue_depth").set(queue_depth as f64);
    }

    pub fn record_completed(&self, latency: Duration) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.processing_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        counter!("taskmesh_tasks_completed_total").increment(1);
        histogram!("taskmesh_task_latency_seconds").record(latency.as_secs_f64());
    }

    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        counter!("taskmesh_tasks_failed_total").increment(1);
    }

    pub fn record_cancelled(&self) {
        self.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
        counter!("taskmesh_tasks_cancelled_total").increment(1);
    }

    pub fn record_short_circuited(&self) {
        self.tasks_short_circuited.fetch_add(1, Ordering::Relaxed);
        counter!("taskmesh_tasks_short_circuited_total").increment(1);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
            tasks_short_circuited: self.tasks_short_circuited.load(Ordering::Relaxed),
            processing_micros: self.processing_micros.load(Ordering::Relaxed),
        }
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter snapshot exposed to operational tooling
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub tasks_short_circuited: u64,
    pub processing_micros: u64,
}

impl MetricsSnapshot {
    /// Mean `process_task` latency in milliseconds over completed tasks
    pub fn avg_processing_ms(&self) -> f64 {
        if self.tasks_completed == 0 {
            0.0
        } else {
            self.processing_micros as f64 / self.tasks_completed as f64 / 1000.0
        }
    }
}
