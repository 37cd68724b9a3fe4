//! State shared between the pool facade, its guards and its workers

use crate::core::{PoolError, Result, TaskQueue, TaskResult};
use crate::pool::slots::{SlotAllocator, SlotLease};
use crate::pool::stats::StatsCollector;
use crate::runtime::ScriptRuntime;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Pool lifecycle. `Stopped` is terminal for a pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PoolState {
    /// Created, not yet initialized
    Uninitialized,
    /// Accepting work
    Initialized,
    /// Shutdown in progress: intake closed, workers finishing
    ShuttingDown,
    /// All workers joined
    Stopped,
}

/// Everything guarded by the single pool lock
#[derive(Debug)]
pub(crate) struct PoolInner {
    pub(crate) state: PoolState,
    pub(crate) slots: SlotAllocator,
    pub(crate) queue: TaskQueue,
    pub(crate) stats: StatsCollector,
    pub(crate) max_queued_tasks: usize,
    pub(crate) task_timeout: Duration,
    next_sequence: u64,
}

impl PoolInner {
    pub(crate) fn new(max_queued_tasks: usize, task_timeout: Duration) -> Self {
        Self {
            state: PoolState::Uninitialized,
            slots: SlotAllocator::default(),
            queue: TaskQueue::new(),
            stats: StatsCollector::default(),
            max_queued_tasks,
            task_timeout,
            next_sequence: 0,
        }
    }

    /// Fails unless the pool is accepting work
    pub(crate) fn check_accepting(&self) -> Result<()> {
        match self.state {
            PoolState::Initialized => Ok(()),
            PoolState::ShuttingDown => Err(PoolError::ShutdownInProgress),
            PoolState::Uninitialized => Err(PoolError::not_initialized("initialize() has not been called")),
            PoolState::Stopped => Err(PoolError::not_initialized("pool has been shut down")),
        }
    }

    /// Workers exit once this is true and the queue is empty
    pub(crate) fn is_closing(&self) -> bool {
        matches!(self.state, PoolState::ShuttingDown | PoolState::Stopped)
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

#[derive(Debug)]
pub(crate) struct PoolShared {
    pub(crate) inner: Mutex<PoolInner>,
    pub(crate) task_available: Condvar,
    pub(crate) slot_available: Condvar,
    pub(crate) runtime: Arc<ScriptRuntime>,
    pub(crate) enable_statistics: bool,
}

impl PoolShared {
    pub(crate) fn new(
        runtime: Arc<ScriptRuntime>,
        max_queued_tasks: usize,
        task_timeout: Duration,
        enable_statistics: bool,
    ) -> Self {
        Self {
            inner: Mutex::new(PoolInner::new(max_queued_tasks, task_timeout)),
            task_available: Condvar::new(),
            slot_available: Condvar::new(),
            runtime,
            enable_statistics,
        }
    }

    /// Return a busy slot to the free set and wake one waiter
    pub(crate) fn release_slot(&self, index: usize) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.slots.give_back(index) {
                return Err(PoolError::invalid_interpreter(index, inner.slots.size()));
            }
        }
        self.slot_available.notify_one();
        Ok(())
    }

    /// Return a slot held under `lease`. False when the slot was already
    /// released or has since been handed to another holder.
    pub(crate) fn release_lease(&self, lease: SlotLease) -> bool {
        let released = self.inner.lock().slots.give_back_lease(lease);
        if released {
            self.slot_available.notify_one();
        }
        released
    }

    pub(crate) fn record_completion(&self, result: &TaskResult) {
        if self.enable_statistics {
            self.inner
                .lock()
                .stats
                .record_completion(result.success, result.execution_time);
        }
    }

    pub(crate) fn record_cancelled(&self, inner: &mut PoolInner, count: usize) {
        if self.enable_statistics && count > 0 {
            inner.stats.record_cancelled(count as u64);
        }
    }
}
