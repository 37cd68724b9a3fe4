//! # Interpreter Pool
//!
//! A bounded interpreter pool and priority task scheduler for an embedded
//! [Rhai](https://rhai.rs) scripting runtime.
//!
//! ## Features
//!
//! - **Interpreter Slots**: `pool_size` logical slots bound how many callers hold the runtime at once
//! - **Priority Scheduling**: Critical > High > Normal > Low, FIFO within a priority
//! - **Non-blocking Submission**: every submission returns a future, even when rejected
//! - **Scoped Acquisition**: RAII guards release the execution lock and the slot exactly once
//! - **Statistics**: task counts, running average and maximum execution time
//! - **Graceful Shutdown**: drain pending work or discard it as cancelled
//!
//! Script execution is serialized by the runtime's single execution lock.
//! Slots provide admission and fairness, not parallel execution.
//!
//! ## Quick Start
//!
//! ```rust
//! use interpreter_pool::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // The embedding application starts the runtime once
//! let runtime = interpreter_pool::runtime::start();
//!
//! let pool = InterpreterPool::with_runtime(PoolConfig::new(4), runtime)?;
//! pool.initialize()?;
//!
//! let future = pool.execute_script("result = 2 + 2", None, None, TaskPriority::High);
//! let result = future.wait();
//! assert!(result.success);
//! assert_eq!(result.value_as::<i64>(), Some(4));
//!
//! pool.shutdown(true);
//! # Ok(())
//! # }
//! ```
//!
//! ## Native Tasks
//!
//! ```rust
//! use interpreter_pool::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! # let pool = InterpreterPool::with_runtime(PoolConfig::new(2), Arc::new(ScriptRuntime::started()))?;
//! # pool.initialize()?;
//! let result = pool.execute(
//!     |runtime: &ScriptRuntime| runtime.eval_expression("[1, 2, 3].len()"),
//!     Duration::from_secs(5),
//! )?;
//! assert_eq!(result.value_as::<i64>(), Some(3));
//!
//! let stats = pool.get_statistics();
//! println!("{} tasks, avg {:.2}ms", stats.total_tasks, stats.average_execution_time_ms);
//! # pool.shutdown(true);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod runtime;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use crate::core::{FutureStatus, PoolError, Result, TaskFuture, TaskPriority, TaskResult};
pub use crate::pool::{
    InterpreterGuard, InterpreterPool, PoolConfig, PoolState, PoolStats, WorkerState,
};
pub use crate::runtime::ScriptRuntime;
