//! Task results and the type-erased task body run by workers

use crate::core::error::Result;
use rhai::Dynamic;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Outcome of one task, delivered through its [`TaskFuture`](crate::TaskFuture).
///
/// Callers check `success` instead of catching errors: failures inside a
/// task never propagate out of the future.
#[derive(Clone, Debug)]
pub struct TaskResult {
    /// Whether the callable completed without error
    pub success: bool,
    /// Value produced by the callable (unit on failure)
    pub value: Dynamic,
    /// Error description when `success` is false
    pub error: Option<String>,
    /// Time spent inside the callable
    pub execution_time: Duration,
}

impl TaskResult {
    /// Successful result carrying `value`
    pub fn ok(value: Dynamic, execution_time: Duration) -> Self {
        Self {
            success: true,
            value,
            error: None,
            execution_time,
        }
    }

    /// Failed result carrying an error description
    pub fn failed(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            value: Dynamic::UNIT,
            error: Some(error.into()),
            execution_time,
        }
    }

    /// Failed result for work that never ran
    pub fn rejected(error: impl fmt::Display) -> Self {
        Self::failed(error.to_string(), Duration::ZERO)
    }

    /// Clone the value out as a concrete type, if it has that type
    pub fn value_as<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.value.clone().try_cast::<T>()
    }
}

/// A unit of queued work: runs the user callable, records its completion
/// and fulfills its promise, then hands the result back to the worker.
pub type BoxedTask = Box<dyn FnOnce() -> TaskResult + Send>;

/// Run `f`, converting its error or panic into a failed [`TaskResult`].
pub(crate) fn run_guarded<F, R>(f: F) -> TaskResult
where
    F: FnOnce() -> Result<R>,
    R: Clone + Send + Sync + 'static,
{
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(f));
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(value)) => TaskResult::ok(Dynamic::from(value), elapsed),
        Ok(Err(e)) => TaskResult::failed(e.to_string(), elapsed),
        Err(panic_info) => TaskResult::failed(
            format!("task panicked: {}", panic_message(panic_info.as_ref())),
            elapsed,
        ),
    }
}

/// Best-effort extraction of a panic payload message
pub(crate) fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
