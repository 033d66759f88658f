// src/utils/config.rs
//! Engine configuration
//!
//! Layered loading via the `config` crate: built-in defaults, then an
//! optional `taskmesh.toml` in the working directory, then `TASKMESH_*`
//! environment variables (e.g. `TASKMESH_RUNTIME__MAX_CONCURRENT_TASKS=8`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::errors::{EngineError, Result};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,
}

/// Worker pool and lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Fixed worker pool size per runtime instance
    #[serde(default = "defaults::max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Queue depth above which the health signal reports unhealthy
    #[serde(default = "defaults::queue_high_water")]
    pub queue_high_water: usize,

    #[serde(default = "defaults::enabled")]
    pub enable_caching: bool,

    #[serde(default = "defaults::enabled")]
    pub enable_circuit_breaker: bool,

    /// Grace period granted to in-flight tasks at shutdown
    #[serde(default = "defaults::shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: defaults::max_concurrent_tasks(),
            queue_high_water: defaults::queue_high_water(),
            enable_caching: defaults::enabled(),
            enable_circuit_breaker: defaults::enabled(),
            shutdown_grace_secs: defaults::shutdown_grace_secs(),
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry time-to-live in seconds
    #[serde(default = "defaults::cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum entry count before oldest-entry eviction
    #[serde(default = "defaults::cache_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl_secs(),
            max_entries: defaults::cache_max_entries(),
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds spent open before allowing a recovery probe
    #[serde(default = "defaults::open_duration_secs")]
    pub open_duration_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
            open_duration_secs: defaults::open_duration_secs(),
        }
    }
}

mod defaults {
    pub fn max_concurrent_tasks() -> usize {
        4
    }
    pub fn queue_high_water() -> usize {
        100
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn shutdown_grace_secs() -> u64 {
        30
    }
    pub fn cache_ttl_secs() -> u64 {
        300
    }
    pub fn cache_max_entries() -> usize {
        1000
    }
    pub fn failure_threshold() -> u32 {
        5
    }
    pub fn open_duration_secs() -> u64 {
        30
    }
}

impl EngineConfig {
    /// Load configuration from `taskmesh.toml` (optional) and environment
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("taskmesh").required(false))
            .add_source(config::Environment::with_prefix("TASKMESH").separator("__"))
            .build()?;

        let engine: EngineConfig = cfg.try_deserialize()?;
        engine.validate()?;
        Ok(engine)
    }

    /// Load configuration from an explicit file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        let engine: EngineConfig = cfg.try_deserialize()?;
        engine.validate()?;
        Ok(engine)
    }

    /// Validate construction parameters; fatal, not recoverable
    pub fn validate(&self) -> Result<()> {
        if self.runtime.max_concurrent_tasks == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.runtime.queue_high_water == 0 {
            return Err(EngineError::InvalidConfiguration(
                "queue_high_water must be at least 1".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(EngineError::InvalidConfiguration(
                "cache.max_entries must be at least 1".into(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(EngineError::InvalidConfiguration(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
