// src/runtime/task.rs
//! Task model: the unit of work submitted to an agent runtime
//!
//! A [`Task`] carries intent (`description`), data (`payload`), and a role
//! tag (`agent_type`). The task value itself is immutable once submitted;
//! lifecycle state is observable through the [`TaskHandle`] returned by
//! submission, where exactly one writer (the owning worker, or the shutdown
//! path for unclaimed tasks) advances the status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{oneshot, watch};
use ulid::Ulid;

use crate::utils::errors::{EngineError, Result};

/// Role tag identifying which agent owns a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Ceo,
    Cfo,
    Cto,
    Cmo,
    Cco,
    Clo,
    Cpo,
    Cgo,
    Cro,
    ContentGeneration,
    BusinessLogic,
    IntelligentRouter,
}

impl AgentType {
    /// Stable tag used in fingerprints and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ceo => "ceo",
            Self::Cfo => "cfo",
            Self::Cto => "cto",
            Self::Cmo => "cmo",
            Self::Cco => "cco",
            Self::Clo => "clo",
            Self::Cpo => "cpo",
            Self::Cgo => "cgo",
            Self::Cro => "cro",
            Self::ContentGeneration => "content_generation",
            Self::BusinessLogic => "business_logic",
            Self::IntelligentRouter => "intelligent_router",
        }
    }
}

/// Dispatch priority; lower values are served first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Task lifecycle status
///
/// `Pending → Queued → Running → {Completed | Failed}`, with `Cancelled`
/// reachable from any non-terminal state when shutdown is requested. No
/// transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// A unit of work submitted to an agent runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within the runtime's lifetime (caller-supplied or generated)
    pub id: String,

    /// Free-text intent, consumed by agent logic
    pub description: String,

    /// Role tag identifying the owning agent
    pub agent_type: AgentType,

    /// Arbitrary structured data; never mutated by the runtime
    pub payload: serde_json::Value,

    /// Dispatch priority (lower first); same-priority tasks are FIFO
    pub priority: TaskPriority,

    /// Submission wall-clock timestamp
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with a generated ULID id and empty payload
    pub fn new(description: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: Ulid::new().to_string(),
            description: description.into(),
            agent_type,
            payload: serde_json::Value::Null,
            priority: TaskPriority::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Deterministic digest of the task's semantically relevant fields
    ///
    /// SHA-256 over `(agent_type, description, payload)`. The payload is
    /// serialized through `serde_json`, whose object representation keeps
    /// keys sorted, so structurally equal payloads fingerprint identically
    /// regardless of key insertion order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.agent_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.description.as_bytes());
        hasher.update([0u8]);
        let payload = serde_json::to_string(&self.payload).unwrap_or_default();
        hasher.update(payload.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Handle returned by `submit_task`
///
/// Observing status and awaiting the result are separate suspension points:
/// `status()` never blocks, `wait()` consumes the handle and suspends until
/// the task reaches a terminal state.
pub struct TaskHandle {
    task_id: String,
    status_rx: watch::Receiver<TaskStatus>,
    result_rx: oneshot::Receiver<Result<serde_json::Value>>,
}

impl TaskHandle {
    pub(crate) fn new(
        task_id: String,
        status_rx: watch::Receiver<TaskStatus>,
        result_rx: oneshot::Receiver<Result<serde_json::Value>>,
    ) -> Self {
        Self {
            task_id,
            status_rx,
            result_rx,
        }
    }

    /// Id of the task this handle tracks
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Latest observed status (non-blocking)
    pub fn status(&self) -> TaskStatus {
        let status = *self.status_rx.borrow();
        // Sender dropped while the last update was still non-terminal: the
        // owning worker was force-aborted, so the task ended cancelled.
        if status.is_active() && self.status_rx.has_changed().is_err() {
            return TaskStatus::Cancelled;
        }
        status
    }

    /// Suspend until the status changes, returning the new value
    pub async fn status_changed(&mut self) -> TaskStatus {
        let _ = self.status_rx.changed().await;
        self.status()
    }

    /// Await the terminal result of the task
    ///
    /// Resolves to the `process_task` result on completion, the recorded
    /// error on failure, or `EngineError::Cancelled` if the task was
    /// abandoned during shutdown.
    pub async fn wait(self) -> Result<serde_json::Value> {
        let task_id = self.task_id;
        match self.result_rx.await {
            Ok(result) => result,
            // Sender dropped without a terminal result: the worker holding
            // it was force-aborted during shutdown.
            Err(_) => Err(EngineError::Cancelled(task_id)),
        }
    }
}
