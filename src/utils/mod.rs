// src/utils/mod.rs
//! Common utilities: configuration and error types

pub mod config;
pub mod errors;

pub use config::{BreakerConfig, CacheConfig, EngineConfig, RuntimeSettings};
pub use errors::{EngineError, Result};
