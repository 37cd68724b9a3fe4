//! Core types shared by the pool and the scripting runtime

pub mod error;
pub mod future;
pub mod priority;
pub mod task;

pub use error::{PoolError, Result};
pub use future::{FutureStatus, TaskFuture, TaskPromise};
pub use priority::{PrioritizedTask, TaskPriority, TaskQueue};
pub use task::{BoxedTask, TaskResult};
