// src/lib.rs
//! Taskmesh Engine Library
//!
//! A single-process, in-memory task execution runtime for autonomous
//! agents. Every concrete agent (CEO, CFO, CTO, content generation, ...)
//! composes with [`runtime::AgentRuntime`] by implementing the
//! [`runtime::Agent`] trait; the runtime handles everything around the
//! agent's `process_task`:
//!
//! - **runtime**: task model, worker pool, circuit breaker, result cache,
//!   health signal, orchestration and graceful shutdown
//! - **observability**: tracing/metrics setup and runtime counters
//! - **utils**: configuration loading and the engine error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use taskmesh_engine::runtime::{Agent, AgentRuntime, AgentRuntimeConfig, AgentType, Task};
//! use taskmesh_engine::utils::errors::Result;
//!
//! struct LedgerAgent;
//!
//! #[async_trait]
//! impl Agent for LedgerAgent {
//!     async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
//!         Ok(serde_json::json!({ "handled": task.description }))
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let config = AgentRuntimeConfig::new("cfo_agent", AgentType::Cfo);
//! let runtime = AgentRuntime::new(config, Arc::new(LedgerAgent))?;
//!
//! let handle = runtime.submit_task(Task::new("Analyze quarterly P&L", AgentType::Cfo))?;
//! let result = handle.wait().await?;
//!
//! runtime.shutdown(Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

// Public module exports
pub mod observability;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use runtime::agent_runtime::{Agent, AgentRuntime, AgentRuntimeConfig};
pub use runtime::task::{AgentType, Task, TaskHandle, TaskPriority, TaskStatus};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
