//! Pool statistics
//!
//! Counters live inside the pool's state lock. Each completion updates the
//! count, the running average and the maximum in one step, so two workers
//! finishing at the same time can never interleave their updates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Snapshot of pool statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// Tasks that ran to completion (successfully or not)
    pub total_tasks: u64,
    /// Tasks whose callable succeeded
    pub successful_tasks: u64,
    /// Tasks whose callable returned an error or panicked
    pub failed_tasks: u64,
    /// Tasks discarded before they started
    pub cancelled_tasks: u64,
    /// Tasks waiting in the queue
    pub current_queued_tasks: usize,
    /// Free slots
    pub available_interpreters: usize,
    /// Held slots
    pub busy_interpreters: usize,
    /// Running average of task execution time
    pub average_execution_time_ms: f64,
    /// Longest task execution time seen
    pub max_execution_time_ms: f64,
    /// Wall-clock time of the most recent completion
    pub last_task_time: Option<DateTime<Utc>>,
}

impl PoolStats {
    /// Returns the success rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            100.0
        } else {
            (self.successful_tasks as f64 / self.total_tasks as f64) * 100.0
        }
    }

    /// Render as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Accumulated counters. Gauges are filled in at snapshot time.
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    total_tasks: u64,
    successful_tasks: u64,
    failed_tasks: u64,
    cancelled_tasks: u64,
    average_ms: f64,
    max_ms: f64,
    last_task_time: Option<DateTime<Utc>>,
}

impl StatsCollector {
    pub(crate) fn record_completion(&mut self, success: bool, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        self.total_tasks += 1;
        if success {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }

        let n = self.total_tasks as f64;
        self.average_ms = (self.average_ms * (n - 1.0) + elapsed_ms) / n;
        if elapsed_ms > self.max_ms {
            self.max_ms = elapsed_ms;
        }
        self.last_task_time = Some(Utc::now());
    }

    pub(crate) fn record_cancelled(&mut self, count: u64) {
        self.cancelled_tasks += count;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn snapshot(&self, queued: usize, available: usize, busy: usize) -> PoolStats {
        PoolStats {
            total_tasks: self.total_tasks,
            successful_tasks: self.successful_tasks,
            failed_tasks: self.failed_tasks,
            cancelled_tasks: self.cancelled_tasks,
            current_queued_tasks: queued,
            available_interpreters: available,
            busy_interpreters: busy,
            average_execution_time_ms: self.average_ms,
            max_execution_time_ms: self.max_ms,
            last_task_time: self.last_task_time,
        }
    }
}
