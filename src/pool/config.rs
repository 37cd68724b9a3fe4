//! Interpreter pool configuration

use crate::core::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an [`InterpreterPool`](crate::InterpreterPool)
///
/// Serializes with the camelCase keys used in server configuration files
/// (`poolSize`, `taskTimeoutMs`, ...). Missing keys take their defaults.
///
/// ```rust
/// use interpreter_pool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new(2)
///     .with_max_queued_tasks(64)
///     .with_acquire_timeout(Duration::from_millis(500));
/// assert_eq!(config.effective_worker_threads(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Number of logical interpreter slots
    pub pool_size: usize,
    /// Maximum number of pending tasks before submissions are rejected
    pub max_queued_tasks: usize,
    /// Default wait used by [`execute_with_default_timeout`](crate::InterpreterPool::execute_with_default_timeout)
    #[serde(rename = "taskTimeoutMs", with = "duration_ms")]
    pub task_timeout: Duration,
    /// Default wait used by [`acquire_default`](crate::InterpreterPool::acquire_default)
    #[serde(rename = "acquireTimeoutMs", with = "duration_ms")]
    pub acquire_timeout: Duration,
    /// Record completion and cancellation counters
    pub enable_statistics: bool,
    /// Import `modules_to_preload` during initialization
    pub preload_modules: bool,
    /// Modules imported when `preload_modules` is set
    pub modules_to_preload: Vec<String>,
    /// Reserved. Accepted but not implemented: execution stays serialized
    /// through the single execution lock.
    pub use_subinterpreters: bool,
    /// Worker thread count (0 = `pool_size`)
    pub worker_threads: usize,
    /// Worker thread name prefix
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            max_queued_tasks: 1000,
            task_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(5),
            enable_statistics: true,
            preload_modules: false,
            modules_to_preload: Vec::new(),
            use_subinterpreters: false,
            worker_threads: 0,
            thread_name_prefix: "interp-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with the given number of slots
    #[must_use]
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PoolError::invalid_config("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as JSON
    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a plain number, bool or string.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Set maximum number of queued tasks
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_queued_tasks(mut self, max: usize) -> Self {
        self.max_queued_tasks = max;
        self
    }

    /// Set default task wait
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set default slot acquisition wait
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Enable or disable statistics
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_statistics(mut self, enable: bool) -> Self {
        self.enable_statistics = enable;
        self
    }

    /// Preload the given modules during initialization
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_preloaded_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules_to_preload = modules.into_iter().map(Into::into).collect();
        self.preload_modules = !self.modules_to_preload.is_empty();
        self
    }

    /// Set worker thread count (0 = one per slot)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Number of worker threads the pool will spawn
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            self.pool_size
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(PoolError::invalid_config(
                "pool_size",
                "Pool size must be greater than 0",
            ));
        }
        if self.max_queued_tasks == 0 {
            return Err(PoolError::invalid_config(
                "max_queued_tasks",
                "Queue capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
