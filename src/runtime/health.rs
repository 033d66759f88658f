// src/runtime/health.rs
//! Health signal composition
//!
//! The base signal is `true` iff the circuit breaker is not open and the
//! queue depth sits below the configured high-water mark. Concrete agents
//! AND their own dependency checks into this via
//! `AgentRuntime::health_check`; the base signal is never skipped.

use std::sync::Arc;

use serde::Serialize;

use crate::runtime::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::runtime::queue::TaskQueue;

/// Structured health report for operational tooling
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Base signal: breaker not open AND queue below high-water
    pub healthy: bool,
    pub breaker_state: BreakerState,
    pub queue_depth: usize,
    pub queue_high_water: usize,
    pub workers: usize,
}

/// Computes the base health signal from breaker and pool state
pub struct HealthMonitor {
    queue: Arc<TaskQueue>,
    breaker: Option<Arc<CircuitBreaker>>,
    queue_high_water: usize,
    workers: usize,
}

impl HealthMonitor {
    pub fn new(
        queue: Arc<TaskQueue>,
        breaker: Option<Arc<CircuitBreaker>>,
        queue_high_water: usize,
        workers: usize,
    ) -> Self {
        Self {
            queue,
            breaker,
            queue_high_water,
            workers,
        }
    }

    /// Effective breaker state; a disabled breaker reads as closed
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker
            .as_ref()
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }

    pub fn is_healthy(&self) -> bool {
        self.breaker_state() != BreakerState::Open && self.queue.len() < self.queue_high_water
    }

    pub fn report(&self) -> HealthReport {
        let breaker_state = self.breaker_state();
        let queue_depth = self.queue.len();

        HealthReport {
            healthy: breaker_state != BreakerState::Open && queue_depth < self.queue_high_water,
            breaker_state,
            queue_depth,
            queue_high_water: self.queue_high_water,
            workers: self.workers,
        }
    }
}
