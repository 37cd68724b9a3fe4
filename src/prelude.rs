//! Convenient re-exports for common types

pub use crate::core::{FutureStatus, PoolError, Result, TaskFuture, TaskPriority, TaskResult};
pub use crate::pool::{InterpreterGuard, InterpreterPool, PoolConfig, PoolStats};
pub use crate::runtime::ScriptRuntime;
pub use rhai::{Array, Dynamic, Map};
