// src/utils/errors.rs
//! Engine error types
//!
//! All runtime operations return [`Result`], an alias over [`EngineError`].
//! Errors are task-scoped wherever possible: a failure inside one task's
//! processing never propagates into the worker loop or other tasks.

use thiserror::Error;

/// Errors produced by the task execution engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// A task with the same id is already pending, queued, or running
    #[error("duplicate task id: {0}")]
    DuplicateTask(String),

    /// Submission arrived after shutdown was initiated
    #[error("runtime is shutting down, no longer accepting tasks")]
    ShuttingDown,

    /// The circuit breaker is open and short-circuited the task
    #[error("circuit breaker open for agent {agent_id}")]
    CircuitOpen { agent_id: String },

    /// The agent's `process_task` returned an error
    #[error("task processing failed: {0}")]
    Processing(String),

    /// The task was cancelled before or during execution (shutdown)
    #[error("task {0} was cancelled")]
    Cancelled(String),

    /// Invalid construction parameters, fatal at startup
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The result channel for a task was dropped without a terminal result
    #[error("result channel closed for task {0}")]
    ResultChannelClosed(String),

    /// Configuration file/environment could not be loaded
    #[error("configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Tracing/metrics initialization failed
    #[error("observability init failed: {0}")]
    Observability(String),
}

/// Convenience alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether the caller may retry the same submission later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::Processing(_))
    }
}
