//! Tracing integration for observability.
//!
//! Available with the `tracing` feature. The span that is current when a
//! task is submitted is captured and entered again on the worker thread, so
//! task events nest under the caller's span.
//!
//! # Example
//!
//! ```rust,ignore
//! use interpreter_pool::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("interpreter_pool=trace".parse().unwrap()))
//!     .init();
//!
//! let pool = InterpreterPool::new(PoolConfig::default())?;
//! pool.initialize()?;
//!
//! let span = tracing::info_span!("request", id = 17);
//! let _entered = span.enter();
//! pool.execute_script("result = 1", None, None, TaskPriority::High);
//! ```

use crate::core::{BoxedTask, TaskResult};

/// A task body that re-enters the submitter's span when it runs
pub struct TracedTask {
    inner: BoxedTask,
    span: ::tracing::Span,
}

impl TracedTask {
    /// Wrap `task`, capturing the current span
    pub fn new(task: BoxedTask) -> Self {
        Self {
            inner: task,
            span: ::tracing::Span::current(),
        }
    }

    /// Wrap `task` with a specific span
    pub fn with_span(task: BoxedTask, span: ::tracing::Span) -> Self {
        Self { inner: task, span }
    }

    /// Run the task inside its span
    pub fn run(self) -> TaskResult {
        let _guard = self.span.enter();
        (self.inner)()
    }

    /// Erase back into a plain task body
    pub fn into_boxed(self) -> BoxedTask {
        Box::new(move || self.run())
    }
}

/// Metrics recording functions for observability.
///
/// These functions emit tracing events that can be consumed by
/// metrics collection systems like Prometheus via tracing-opentelemetry.
pub mod metrics {
    use std::time::Duration;

    /// Records a task submission event.
    #[inline]
    pub fn record_submission(queue_depth: usize) {
        ::tracing::trace!(
            counter.tasks_submitted = 1,
            gauge.queue_depth = queue_depth as i64,
            "task submitted"
        );
    }

    /// Records task completion with timing.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            ::tracing::trace!(
                counter.tasks_completed = 1,
                histogram.task_duration_ms = duration_ms,
                "task completed successfully"
            );
        } else {
            ::tracing::trace!(
                counter.tasks_failed = 1,
                histogram.task_duration_ms = duration_ms,
                "task failed"
            );
        }
    }

    /// Records tasks discarded before they ran.
    #[inline]
    pub fn record_cancelled(count: usize) {
        if count > 0 {
            ::tracing::trace!(counter.tasks_cancelled = count as u64, "tasks cancelled");
        }
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        ::tracing::trace!(gauge.workers_busy = 1, worker_id = worker_id, "worker busy");
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        ::tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_id = worker_id,
            "worker idle"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(num_workers: usize, pool_size: usize) {
        ::tracing::info!(
            workers = num_workers,
            slots = pool_size,
            "interpreter pool started"
        );
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_shutdown(tasks_completed: u64, tasks_failed: u64) {
        ::tracing::info!(
            tasks_completed = tasks_completed,
            tasks_failed = tasks_failed,
            "interpreter pool shutdown complete"
        );
    }
}
