//! Error types for the interpreter pool

/// Result type for interpreter pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the interpreter pool
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool (or the scripting runtime it depends on) is not initialized
    #[error("Interpreter pool not initialized: {reason}")]
    PoolNotInitialized {
        /// Why the pool is unusable
        reason: String,
    },

    /// Every interpreter slot is busy
    #[error("Interpreter pool exhausted: {busy}/{total} interpreters busy")]
    PoolExhausted {
        /// Number of busy slots
        busy: usize,
        /// Total number of slots
        total: usize,
    },

    /// Pending task queue is at capacity
    #[error("Task queue full: {current}/{max} tasks queued")]
    TaskQueueFull {
        /// Current queue size
        current: usize,
        /// Maximum queue size
        max: usize,
    },

    /// Script or callable execution failed
    #[error("Execution failed: {message}")]
    ExecutionFailed {
        /// Error message
        message: String,
    },

    /// A bounded wait expired
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that was waiting
        operation: &'static str,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Task was cancelled before it started
    #[error("Task cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation
        reason: String,
    },

    /// The global execution lock could not be taken in time
    #[error("Failed to acquire the execution lock within {timeout_ms}ms")]
    LockAcquisitionFailed {
        /// Time spent waiting in milliseconds
        timeout_ms: u64,
    },

    /// Slot index is unknown or not currently held
    #[error("Invalid interpreter index {index} (pool size {pool_size})")]
    InvalidInterpreter {
        /// Offending slot index
        index: usize,
        /// Number of slots in the pool
        pool_size: usize,
    },

    /// The pool is shutting down and accepts no new work
    #[error("Interpreter pool is shutting down")]
    ShutdownInProgress,

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{worker_id}: {message}")]
    SpawnError {
        /// ID of the worker that failed to spawn
        worker_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Anything that does not fit the categories above
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PoolError {
    /// Create a not initialized error
    pub fn not_initialized(reason: impl Into<String>) -> Self {
        PoolError::PoolNotInitialized {
            reason: reason.into(),
        }
    }

    /// Create a pool exhausted error
    pub fn exhausted(busy: usize, total: usize) -> Self {
        PoolError::PoolExhausted { busy, total }
    }

    /// Create a queue full error
    pub fn queue_full(current: usize, max: usize) -> Self {
        PoolError::TaskQueueFull { current, max }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        PoolError::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: &'static str, timeout: std::time::Duration) -> Self {
        PoolError::Timeout {
            operation,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a cancelled error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        PoolError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a lock acquisition error
    pub fn lock_failed(waited: std::time::Duration) -> Self {
        PoolError::LockAcquisitionFailed {
            timeout_ms: waited.as_millis() as u64,
        }
    }

    /// Create an invalid interpreter error
    pub fn invalid_interpreter(index: usize, pool_size: usize) -> Self {
        PoolError::InvalidInterpreter { index, pool_size }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn(worker_id: usize, source: std::io::Error) -> Self {
        PoolError::SpawnError {
            worker_id,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an unknown error
    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        PoolError::Unknown(msg.into())
    }

    /// Whether this error is a timeout of any bounded wait
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }
}

impl From<Box<rhai::EvalAltResult>> for PoolError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        PoolError::execution(err.to_string())
    }
}

impl From<rhai::ParseError> for PoolError {
    fn from(err: rhai::ParseError) -> Self {
        PoolError::execution(err.to_string())
    }
}
