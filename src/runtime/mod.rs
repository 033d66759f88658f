// src/runtime/mod.rs
//! Agent task execution runtime
//!
//! This module provides the core execution engine every concrete agent
//! composes with:
//!
//! - **Task model**: tasks, lifecycle status, priorities, handles
//! - **Task Queue**: priority-then-FIFO dispatch with cancellation-aware waits
//! - **Worker Pool**: fixed-size pool bounding in-flight work
//! - **Circuit Breaker**: per-agent failure isolation with fast-fail
//! - **Result Cache**: fingerprint-keyed memoization of task results
//! - **Health**: breaker + queue saturation signal, extensible per agent
//! - **Agent Runtime**: orchestration of submission, dispatch, and shutdown
//!
//! # Architecture
//!
//! ```text
//! caller ──submit_task──▶ AgentRuntime
//!                             │
//!                        TaskQueue (priority / FIFO)
//!                             │
//!              ┌──────────────┼──────────────┐
//!          Worker 1       Worker 2   ...  Worker N   (max_concurrent_tasks)
//!              │
//!       CircuitBreaker ──open──▶ fail fast
//!              │
//!        ResultCache ──hit──▶ complete without invoking
//!              │
//!       Agent::process_task
//! ```
//!
//! Each runtime instance owns its queue, breaker, and cache; nothing is
//! shared across agent instances.

pub mod agent_runtime;
pub mod circuit_breaker;
pub mod health;
pub mod queue;
pub mod result_cache;
pub mod task;
pub mod worker_pool;

// Re-export commonly used types
pub use agent_runtime::{Agent, AgentRuntime, AgentRuntimeConfig};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use health::{HealthMonitor, HealthReport};
pub use queue::TaskQueue;
pub use result_cache::{CacheStats, ResultCache};
pub use task::{AgentType, Task, TaskHandle, TaskPriority, TaskStatus};
pub use worker_pool::WorkerPool;
