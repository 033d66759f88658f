// src/main.rs
//! Taskmesh Engine
//!
//! Smoke binary: starts a runtime with a sample echo agent, submits a few
//! tasks, and shuts down gracefully on completion or ctrl-c.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskmesh_engine::observability::{init_metrics, init_tracing};
use taskmesh_engine::runtime::{Agent, AgentRuntime, AgentRuntimeConfig, AgentType, Task};
use taskmesh_engine::utils::config::EngineConfig;
use taskmesh_engine::EngineError;
use tracing::{info, warn};

/// Sample agent that echoes the task payload back
struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    async fn process_task(
        &self,
        task: &Task,
    ) -> taskmesh_engine::Result<serde_json::Value> {
        info!(task_id = %task.id, "processing {}", task.description);
        Ok(task.payload.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize observability (tracing, metrics)
    init_tracing()?;
    let _metrics_handle = init_metrics()?;

    info!("Starting Taskmesh Engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (taskmesh.toml + TASKMESH_* env)
    let config = EngineConfig::load()?;
    info!("Configuration loaded: {:?}", config);

    let runtime_config =
        AgentRuntimeConfig::from_engine("echo_agent", AgentType::BusinessLogic, &config);
    let shutdown_grace = Duration::from_secs(config.runtime.shutdown_grace_secs);
    let runtime = Arc::new(AgentRuntime::new(runtime_config, Arc::new(EchoAgent))?);

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let task = Task::new(format!("demo task {i}"), AgentType::BusinessLogic)
                .with_payload(serde_json::json!({ "n": i }));
            runtime.submit_task(task.clone()).map(|handle| (task, handle))
        })
        .collect::<taskmesh_engine::Result<_>>()?;

    // Wait for results unless interrupted first; transient failures (open
    // breaker, handler errors) get a single resubmission
    let work = async {
        for (task, handle) in handles {
            match handle.wait().await {
                Ok(result) => info!(%result, "task finished"),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, task_id = %task.id, "task failed, retrying once");
                    let retry = task.with_id(format!("{}_retry", ulid::Ulid::new()));
                    let result = runtime.submit_task(retry)?.wait().await?;
                    info!(%result, "task finished after retry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok::<_, EngineError>(())
    };

    tokio::select! {
        outcome = work => {
            outcome?;
            info!(healthy = runtime.health_check().await, "all demo tasks finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, cleaning up...");
        }
    }

    runtime.shutdown(shutdown_grace).await?;
    info!("Engine stopped gracefully");
    Ok(())
}
