// src/runtime/circuit_breaker.rs
//! Per-agent circuit breaker
//!
//! Stops dispatching to a consistently failing `process_task` implementation.
//! State machine: `Closed → Open → HalfOpen → {Closed | Open}`.
//!
//! - `Closed`: normal operation, consecutive failures are counted.
//! - `Open`: all tasks fail fast with `CircuitOpen`; after `open_duration`
//!   the next acquisition attempt transitions to `HalfOpen`.
//! - `HalfOpen`: exactly one probe task is allowed through; its outcome
//!   decides between `Closed` (recovered) and `Open` (timer reset).
//!
//! Each runtime instance owns its own breaker; failure domains differ per
//! agent, so breaker state is never shared.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Breaker state, exposed through the health surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Consecutive-failure circuit breaker
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            failure_threshold,
            open_duration,
        }
    }

    /// Ask permission to dispatch one task
    ///
    /// Returns `false` while `Open` (before the cooldown elapses) and while
    /// a `HalfOpen` probe is already in flight. A `true` return in
    /// `HalfOpen` claims the single probe slot.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed >= self.open_duration {
                    debug!("circuit breaker cooldown elapsed, allowing probe");
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Record a successful `process_task` invocation
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            BreakerState::HalfOpen => {
                debug!("probe succeeded, closing circuit breaker");
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
            }
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            // Success reported while Open can only come from a task claimed
            // before the breaker tripped; keep the cooldown running.
            BreakerState::Open => {}
        }
    }

    /// Record a failed `process_task` invocation
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening circuit breaker"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!("probe failed, re-opening circuit breaker");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
            }
            BreakerState::Open => {}
        }
    }

    /// Release an unused probe slot
    ///
    /// Used when an acquired dispatch never reached `process_task` (e.g. the
    /// task was served from cache), so the `HalfOpen` probe slot is freed
    /// without recording an outcome.
    pub fn cancel_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    /// Current state (without triggering timed transitions)
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Consecutive failures observed while `Closed`
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}
