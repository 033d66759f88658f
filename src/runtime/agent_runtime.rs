// src/runtime/agent_runtime.rs
//! Agent runtime: the execution engine every concrete agent composes with
//!
//! Coordinates task submission, dispatch to the agent's `process_task`
//! handler, result caching, circuit breaker consultation, health
//! aggregation, and graceful shutdown. Concrete agents implement [`Agent`]
//! and are injected at construction; the runtime never subclasses anything.
//!
//! Each runtime instance owns its queue, breaker, and cache. Nothing is
//! shared across instances, so one agent's failures or cached results never
//! leak into another's.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::observability::{MetricsSnapshot, RuntimeMetrics};
use crate::runtime::circuit_breaker::{BreakerState, CircuitBreaker};
use crate::runtime::health::{HealthMonitor, HealthReport};
use crate::runtime::queue::{QueuedTask, TaskQueue};
use crate::runtime::result_cache::{CacheStats, ResultCache};
use crate::runtime::task::{AgentType, Task, TaskHandle, TaskStatus};
use crate::runtime::worker_pool::{WorkerContext, WorkerPool};
use crate::utils::config::{BreakerConfig, CacheConfig, EngineConfig};
use crate::utils::errors::{EngineError, Result};

/// Capability contract every concrete agent provides
///
/// `process_task` must be idempotent with respect to the task's fingerprint
/// when caching is enabled: the runtime assumes two invocations with
/// equivalent input yield equivalent results.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute one unit of work; errors are isolated to this task
    async fn process_task(&self, task: &Task) -> Result<serde_json::Value>;

    /// Agent-specific dependency checks, ANDed into the base health signal
    async fn health_check(&self) -> bool {
        true
    }
}

/// Construction parameters for an agent runtime
#[derive(Debug, Clone)]
pub struct AgentRuntimeConfig {
    /// Identifier used in logs, errors, and metrics labels
    pub agent_id: String,

    /// Role this runtime serves
    pub agent_type: AgentType,

    /// Fixed worker pool size (≥ 1)
    pub max_concurrent_tasks: usize,

    pub enable_caching: bool,
    pub enable_circuit_breaker: bool,

    /// Queue depth above which the health signal degrades
    pub queue_high_water: usize,

    pub cache: CacheConfig,
    pub breaker: BreakerConfig,
}

impl AgentRuntimeConfig {
    /// Defaults for the given identity (pool of 4, caching and breaker on)
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType) -> Self {
        let engine = EngineConfig::default();
        Self::from_engine(agent_id, agent_type, &engine)
    }

    /// Derive a per-agent config from loaded engine settings
    pub fn from_engine(
        agent_id: impl Into<String>,
        agent_type: AgentType,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            max_concurrent_tasks: engine.runtime.max_concurrent_tasks,
            enable_caching: engine.runtime.enable_caching,
            enable_circuit_breaker: engine.runtime.enable_circuit_breaker,
            queue_high_water: engine.runtime.queue_high_water,
            cache: engine.cache.clone(),
            breaker: engine.breaker.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent_id.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "agent_id must not be empty".into(),
            ));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.queue_high_water == 0 {
            return Err(EngineError::InvalidConfiguration(
                "queue_high_water must be at least 1".into(),
            ));
        }
        if self.enable_circuit_breaker && self.breaker.failure_threshold == 0 {
            return Err(EngineError::InvalidConfiguration(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.enable_caching && self.cache.max_entries == 0 {
            return Err(EngineError::InvalidConfiguration(
                "cache.max_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Task execution runtime for a single agent instance
pub struct AgentRuntime {
    config: AgentRuntimeConfig,
    ctx: Arc<WorkerContext>,
    pool: WorkerPool,
    health: HealthMonitor,
    shutdown_token: CancellationToken,
    shutdown_started: AtomicBool,
}

impl AgentRuntime {
    /// Build the runtime and start its worker pool
    ///
    /// Must be called within a Tokio runtime; workers are spawned here.
    pub fn new(config: AgentRuntimeConfig, agent: Arc<dyn Agent>) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::new());
        let metrics = Arc::new(RuntimeMetrics::new());

        let cache = config.enable_caching.then(|| {
            Arc::new(ResultCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.max_entries,
            ))
        });

        let breaker = config.enable_circuit_breaker.then(|| {
            Arc::new(CircuitBreaker::new(
                config.breaker.failure_threshold,
                Duration::from_secs(config.breaker.open_duration_secs),
            ))
        });

        let ctx = Arc::new(WorkerContext {
            agent_id: config.agent_id.clone(),
            agent,
            queue: Arc::clone(&queue),
            cache: cache.clone(),
            breaker: breaker.clone(),
            active: Arc::new(DashMap::new()),
            inflight: DashMap::new(),
            metrics: Arc::clone(&metrics),
        });

        let shutdown_token = CancellationToken::new();
        let pool = WorkerPool::start(
            config.max_concurrent_tasks,
            Arc::clone(&ctx),
            shutdown_token.clone(),
        );

        let health = HealthMonitor::new(
            Arc::clone(&queue),
            breaker,
            config.queue_high_water,
            config.max_concurrent_tasks,
        );

        info!(
            agent_id = %config.agent_id,
            agent_type = config.agent_type.as_str(),
            workers = config.max_concurrent_tasks,
            caching = config.enable_caching,
            circuit_breaker = config.enable_circuit_breaker,
            "agent runtime started"
        );

        Ok(Self {
            config,
            ctx,
            pool,
            health,
            shutdown_token,
            shutdown_started: AtomicBool::new(false),
        })
    }

    /// Submit a task for execution; never blocks the caller
    ///
    /// The task transitions `Pending → Queued` here; waiting for the result
    /// is a separate suspension point on the returned [`TaskHandle`].
    pub fn submit_task(&self, task: Task) -> Result<TaskHandle> {
        if self.shutdown_started.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }

        // Claim the id among non-terminal tasks
        match self.ctx.active.entry(task.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(EngineError::DuplicateTask(task.id));
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(());
            }
        }

        let (status_tx, status_rx) = watch::channel(TaskStatus::Pending);
        let (result_tx, result_rx) = oneshot::channel();
        let handle = TaskHandle::new(task.id.clone(), status_rx, result_rx);

        debug!(task_id = %task.id, priority = ?task.priority, "task submitted");

        let entry = QueuedTask::new(task, status_tx, result_tx);
        entry.set_status(TaskStatus::Queued);
        self.ctx.queue.push(entry);

        // Shutdown may have drained the queue between the intake check and
        // the push, with the workers already gone. Re-check and sweep so the
        // entry cannot be stranded; the handle then resolves `Cancelled`.
        if self.shutdown_started.load(Ordering::SeqCst) {
            self.cancel_queued();
            return Err(EngineError::ShuttingDown);
        }

        self.ctx.metrics.record_submitted(self.ctx.queue.len());

        Ok(handle)
    }

    /// Drain the queue, marking every unclaimed entry `Cancelled`
    fn cancel_queued(&self) -> usize {
        let drained = self.ctx.queue.drain();
        let cancelled = drained.len();
        for entry in drained {
            self.ctx.active.remove(&entry.task.id);
            self.ctx.metrics.record_cancelled();
            entry.cancel();
        }
        cancelled
    }

    /// Combined health signal: base (breaker + queue depth) AND the agent's
    /// own checks; the base signal is never skipped
    pub async fn health_check(&self) -> bool {
        let base = self.health.is_healthy();
        base && self.ctx.agent.health_check().await
    }

    /// Structured base health report
    pub fn health_report(&self) -> HealthReport {
        self.health.report()
    }

    /// Stop intake, cancel queued tasks, and wait for in-flight work
    ///
    /// Idempotent: the second call returns immediately. In-flight tasks get
    /// up to `timeout` to finish; stragglers are aborted and their handles
    /// resolve to `EngineError::Cancelled`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            debug!(agent_id = %self.config.agent_id, "shutdown already performed");
            return Ok(());
        }

        info!(agent_id = %self.config.agent_id, "shutting down agent runtime");

        // Wake idle workers; no further tasks are handed out after this
        self.shutdown_token.cancel();

        // Unclaimed queued tasks go straight to Cancelled
        let cancelled = self.cancel_queued();
        if cancelled > 0 {
            info!(cancelled, "cancelled queued tasks");
        }

        self.pool.join(timeout).await;

        info!(agent_id = %self.config.agent_id, "shutdown complete");
        Ok(())
    }

    // Observability surface, consumed by external tooling

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn agent_type(&self) -> AgentType {
        self.config.agent_type
    }

    pub fn queue_depth(&self) -> usize {
        self.ctx.queue.len()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.health.breaker_state()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.ctx.cache.as_ref().map(|c| c.stats())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        // Best-effort cleanup: release idle workers if the caller never
        // invoked shutdown
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Echoes the task payload back as the result
    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
            Ok(task.payload.clone())
        }
    }

    /// Sleeps then succeeds, counting invocations
    struct SleepyAgent {
        sleep: Duration,
        invocations: AtomicUsize,
    }

    impl SleepyAgent {
        fn new(sleep: Duration) -> Self {
            Self {
                sleep,
                invocations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Agent for SleepyAgent {
        async fn process_task(&self, _task: &Task) -> Result<serde_json::Value> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.sleep).await;
            Ok(json!({"ok": true}))
        }
    }

    /// Always fails
    struct BrokenAgent;

    #[async_trait]
    impl Agent for BrokenAgent {
        async fn process_task(&self, _task: &Task) -> Result<serde_json::Value> {
            Err(EngineError::Processing("dependency unreachable".into()))
        }
    }

    fn plain_config(agent_id: &str) -> AgentRuntimeConfig {
        let mut config = AgentRuntimeConfig::new(agent_id, AgentType::Cfo);
        config.enable_caching = false;
        config.enable_circuit_breaker = false;
        config
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let runtime = AgentRuntime::new(plain_config("cfo"), Arc::new(EchoAgent)).unwrap();

        let task = Task::new("Analyze quarterly P&L", AgentType::Cfo)
            .with_payload(json!({"period": "Q3 2024"}));
        let handle = runtime.submit_task(task).unwrap();

        let result = handle.wait().await.unwrap();
        assert_eq!(result, json!({"period": "Q3 2024"}));

        let snapshot = runtime.metrics();
        assert_eq!(snapshot.tasks_submitted, 1);
        assert_eq!(snapshot.tasks_completed, 1);

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_submission_reaches_queued_without_blocking() {
        // A pool of 1 busy with a long task: submissions still return
        // immediately with status at least Queued
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cfo")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(200)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let _blocker = runtime
            .submit_task(Task::new("blocker", AgentType::Cfo))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        let handle = runtime
            .submit_task(Task::new("queued behind", AgentType::Cfo))
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(matches!(
            handle.status(),
            TaskStatus::Queued | TaskStatus::Running
        ));

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected_while_active() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cfo")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(100)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let first = runtime
            .submit_task(Task::new("a", AgentType::Cfo).with_id("task_1"))
            .unwrap();

        let dup = runtime.submit_task(Task::new("b", AgentType::Cfo).with_id("task_1"));
        assert!(matches!(dup, Err(EngineError::DuplicateTask(_))));

        first.wait().await.unwrap();

        // Terminal id may be reused by explicit caller action
        let again = runtime
            .submit_task(Task::new("c", AgentType::Cfo).with_id("task_1"))
            .unwrap();
        again.wait().await.unwrap();

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        struct GaugeAgent {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl Agent for GaugeAgent {
            async fn process_task(&self, _task: &Task) -> Result<serde_json::Value> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(json!(null))
            }
        }

        let agent = Arc::new(GaugeAgent {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 2,
            ..plain_config("cto")
        };
        let runtime = AgentRuntime::new(config, agent.clone()).unwrap();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                runtime
                    .submit_task(Task::new(format!("t{i}"), AgentType::Cto))
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert!(agent.peak.load(Ordering::SeqCst) <= 2);
        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_worker_serializes() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("ceo")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(50)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let started = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                runtime
                    .submit_task(Task::new(format!("t{i}"), AgentType::Ceo))
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_caching_invokes_process_task_once() {
        let mut config = plain_config("cmo");
        config.enable_caching = true;
        config.max_concurrent_tasks = 2;

        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(100)));
        let runtime = AgentRuntime::new(config, agent.clone()).unwrap();

        let started = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|i| {
                let task = Task::new("identical work", AgentType::Cmo)
                    .with_id(format!("dup_{i}"))
                    .with_payload(json!({"k": "v"}));
                runtime.submit_task(task).unwrap()
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.wait().await.unwrap(), json!({"ok": true}));
        }

        assert_eq!(agent.invocations.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(250));

        let stats = runtime.cache_stats().unwrap();
        assert!(stats.hits >= 1);

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_breaker_trips_then_probes() {
        let mut config = plain_config("clo");
        config.enable_circuit_breaker = true;
        config.breaker.failure_threshold = 3;
        config.breaker.open_duration_secs = 1;
        config.max_concurrent_tasks = 1;

        let runtime = AgentRuntime::new(config, Arc::new(BrokenAgent)).unwrap();

        // Tasks 1-3 fail in the agent, tripping the breaker
        for i in 0..3 {
            let handle = runtime
                .submit_task(Task::new(format!("t{i}"), AgentType::Clo))
                .unwrap();
            assert!(matches!(
                handle.wait().await,
                Err(EngineError::Processing(_))
            ));
        }
        assert_eq!(runtime.breaker_state(), BreakerState::Open);

        // Task 4 short-circuits without reaching the agent
        let handle = runtime
            .submit_task(Task::new("t3", AgentType::Clo))
            .unwrap();
        assert!(matches!(
            handle.wait().await,
            Err(EngineError::CircuitOpen { .. })
        ));
        assert_eq!(runtime.metrics().tasks_short_circuited, 1);

        // After the cooldown a single probe is allowed through (and fails)
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let handle = runtime
            .submit_task(Task::new("probe", AgentType::Clo))
            .unwrap();
        assert!(matches!(
            handle.wait().await,
            Err(EngineError::Processing(_))
        ));
        assert_eq!(runtime.breaker_state(), BreakerState::Open);

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_tasks() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cpo")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(500)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let blocker = runtime
            .submit_task(Task::new("blocker", AgentType::Cpo))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let queued: Vec<_> = (0..3)
            .map(|i| {
                runtime
                    .submit_task(Task::new(format!("q{i}"), AgentType::Cpo))
                    .unwrap()
            })
            .collect();

        let started = Instant::now();
        runtime.shutdown(Duration::from_millis(100)).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        for handle in queued {
            assert_eq!(handle.status(), TaskStatus::Cancelled);
            assert!(matches!(
                handle.wait().await,
                Err(EngineError::Cancelled(_))
            ));
        }

        // The in-flight blocker outlived the grace period and was aborted
        assert!(matches!(
            blocker.wait().await,
            Err(EngineError::Cancelled(_))
        ));
        assert_eq!(runtime.metrics().tasks_cancelled, 3);
    }

    #[tokio::test]
    async fn test_aborted_task_reaches_terminal_status() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cto")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_secs(5)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let handle = runtime
            .submit_task(Task::new("long haul", AgentType::Cto))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        runtime.shutdown(Duration::from_millis(50)).await.unwrap();

        // Force-aborted mid-flight: the observable status must still land
        // on a terminal value, not stay Running forever
        assert_eq!(handle.status(), TaskStatus::Cancelled);
        assert!(handle.status().is_terminal());
        assert!(matches!(
            handle.wait().await,
            Err(EngineError::Cancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_submission_racing_shutdown_never_strands_a_task() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cro")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(10)));
        let runtime = Arc::new(AgentRuntime::new(config, agent).unwrap());

        // Hammer submissions from another task while shutdown runs
        let submitter = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                let mut handles = Vec::new();
                for i in 0u32.. {
                    match runtime.submit_task(Task::new(format!("t{i}"), AgentType::Cro)) {
                        Ok(handle) => handles.push(handle),
                        Err(EngineError::ShuttingDown) => break,
                        Err(e) => panic!("unexpected submission error: {e}"),
                    }
                    tokio::task::yield_now().await;
                }
                handles
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        runtime.shutdown(Duration::from_millis(200)).await.unwrap();

        // Nothing may remain queued behind the exited workers, and every
        // accepted handle must resolve to a terminal outcome
        assert_eq!(runtime.queue_depth(), 0);
        for handle in submitter.await.unwrap() {
            let outcome =
                tokio::time::timeout(Duration::from_millis(500), handle.wait()).await;
            assert!(outcome.is_ok(), "accepted task never resolved");
        }
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_blocks_submission() {
        let runtime = AgentRuntime::new(plain_config("cgo"), Arc::new(EchoAgent)).unwrap();

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
        runtime.shutdown(Duration::from_secs(1)).await.unwrap();

        let rejected = runtime.submit_task(Task::new("late", AgentType::Cgo));
        assert!(matches!(rejected, Err(EngineError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_finish_within_grace() {
        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("cco")
        };
        let agent = Arc::new(SleepyAgent::new(Duration::from_millis(50)));
        let runtime = AgentRuntime::new(config, agent).unwrap();

        let handle = runtime
            .submit_task(Task::new("quick", AgentType::Cco))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(handle.wait().await.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_health_aggregation() {
        struct SickAgent;

        #[async_trait]
        impl Agent for SickAgent {
            async fn process_task(&self, _task: &Task) -> Result<serde_json::Value> {
                Ok(json!(null))
            }
            async fn health_check(&self) -> bool {
                false
            }
        }

        let healthy = AgentRuntime::new(plain_config("a"), Arc::new(EchoAgent)).unwrap();
        assert!(healthy.health_check().await);
        assert!(healthy.health_report().healthy);

        let sick = AgentRuntime::new(plain_config("b"), Arc::new(SickAgent)).unwrap();
        // Base signal is fine, the agent override degrades the aggregate
        assert!(sick.health_report().healthy);
        assert!(!sick.health_check().await);

        healthy.shutdown(Duration::from_secs(1)).await.unwrap();
        sick.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_breaker_open_degrades_health() {
        let mut config = plain_config("clo");
        config.enable_circuit_breaker = true;
        config.breaker.failure_threshold = 1;

        let runtime = AgentRuntime::new(config, Arc::new(BrokenAgent)).unwrap();

        let handle = runtime
            .submit_task(Task::new("t", AgentType::Clo))
            .unwrap();
        let _ = handle.wait().await;

        assert_eq!(runtime.breaker_state(), BreakerState::Open);
        assert!(!runtime.health_check().await);

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_configuration() {
        let mut config = plain_config("bad");
        config.max_concurrent_tasks = 0;

        let result = AgentRuntime::new(config, Arc::new(EchoAgent));
        assert!(matches!(
            result,
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_priority_dispatch_order() {
        use crate::runtime::task::TaskPriority;

        struct OrderAgent {
            seen: parking_lot::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl Agent for OrderAgent {
            async fn process_task(&self, task: &Task) -> Result<serde_json::Value> {
                self.seen.lock().push(task.id.clone());
                // Hold the worker so later submissions stack up in the queue
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!(null))
            }
        }

        let config = AgentRuntimeConfig {
            max_concurrent_tasks: 1,
            ..plain_config("router")
        };
        let agent = Arc::new(OrderAgent {
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let runtime = AgentRuntime::new(config, agent.clone()).unwrap();

        // Occupy the single worker so the rest queue up together
        let blocker = runtime
            .submit_task(Task::new("blocker", AgentType::IntelligentRouter))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let low = runtime
            .submit_task(
                Task::new("low", AgentType::IntelligentRouter)
                    .with_id("low")
                    .with_priority(TaskPriority::Low),
            )
            .unwrap();
        let critical = runtime
            .submit_task(
                Task::new("critical", AgentType::IntelligentRouter)
                    .with_id("critical")
                    .with_priority(TaskPriority::Critical),
            )
            .unwrap();

        blocker.wait().await.unwrap();
        critical.wait().await.unwrap();
        low.wait().await.unwrap();

        let seen = agent.seen.lock().clone();
        let critical_pos = seen.iter().position(|id| id == "critical").unwrap();
        let low_pos = seen.iter().position(|id| id == "low").unwrap();
        assert!(critical_pos < low_pos);

        runtime.shutdown(Duration::from_secs(1)).await.unwrap();
    }
}
