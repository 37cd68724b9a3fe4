//! Worker thread implementation

use crate::core::task::panic_message;
use crate::core::{PoolError, PrioritizedTask, Result, TaskResult};
use crate::pool::state::PoolShared;
use crate::runtime::ExecutionGuard;
use log::{debug, warn};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a task
    Idle = 0,
    /// Running a task
    Executing = 1,
    /// Exited its loop
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Executing,
            _ => WorkerState::Stopped,
        }
    }
}

/// A worker thread that pops tasks from the shared priority queue
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl Worker {
    /// Spawn a worker named `<prefix>-<id>`
    pub(crate) fn spawn(id: usize, prefix: &str, shared: Arc<PoolShared>) -> Result<Self> {
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let state_clone = Arc::clone(&state);

        let thread = thread::Builder::new()
            .name(format!("{}-{}", prefix, id))
            .spawn(move || {
                Self::run(id, &shared, &state_clone);
            })
            .map_err(|e| PoolError::spawn(id, e))?;

        Ok(Self {
            id,
            thread: Some(thread),
            state,
        })
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether this worker runs on the calling thread
    pub(crate) fn is_current_thread(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id())
    }

    /// Join the worker thread
    pub(crate) fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|panic_info| {
                PoolError::unknown(format!(
                    "worker {} panicked: {}",
                    self.id,
                    panic_message(panic_info.as_ref())
                ))
            })?;
        }
        Ok(())
    }

    /// Let the thread finish on its own
    pub(crate) fn detach(mut self) {
        self.thread.take();
    }

    /// Main worker loop
    ///
    /// Exits once the pool is closing and the queue is empty, so a
    /// draining shutdown still runs every queued task.
    fn run(id: usize, shared: &PoolShared, state: &AtomicU8) {
        #[cfg(feature = "tracing")]
        let worker_span = ::tracing::debug_span!("worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("Worker {} started", id);

        while let Some((execution, task)) = Self::next_task(shared) {
            state.store(WorkerState::Executing as u8, Ordering::Release);
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_busy(id);

            Self::execute_task(id, shared, task);
            drop(execution);

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_idle(id);
            state.store(WorkerState::Idle as u8, Ordering::Release);
        }

        state.store(WorkerState::Stopped as u8, Ordering::Release);
        debug!("Worker {} stopped", id);
    }

    /// Wait for work, take the execution lock, then pop.
    ///
    /// Popping only while holding the lock means the task that starts next
    /// is always the highest-priority one queued at that moment. The lock
    /// wait is polled so a closing pool with an empty queue releases the
    /// worker even while someone else holds the lock.
    fn next_task(shared: &PoolShared) -> Option<(ExecutionGuard<'_>, PrioritizedTask)> {
        loop {
            {
                let mut inner = shared.inner.lock();
                while inner.queue.is_empty() {
                    if inner.is_closing() {
                        return None;
                    }
                    shared.task_available.wait(&mut inner);
                }
            }

            let Some(execution) = shared.runtime.try_lock_execution(LOCK_POLL_INTERVAL) else {
                continue;
            };
            if let Some(task) = shared.inner.lock().queue.pop() {
                return Some((execution, task));
            }
        }
    }

    /// Execute a single task with panic protection
    fn execute_task(id: usize, shared: &PoolShared, task: PrioritizedTask) -> TaskResult {
        let priority = task.priority();
        let start = Instant::now();

        let result = match catch_unwind(AssertUnwindSafe(task.into_task())) {
            Ok(result) => result,
            Err(panic_info) => {
                // The task body never reached its own bookkeeping
                let result = TaskResult::failed(
                    format!("task panicked: {}", panic_message(panic_info.as_ref())),
                    start.elapsed(),
                );
                shared.record_completion(&result);
                result
            }
        };

        if let Some(error) = result.error.as_deref() {
            warn!("Worker {}: {:?} task failed: {}", id, priority, error);
        }

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_completion(result.execution_time, result.success);

        result
    }
}
