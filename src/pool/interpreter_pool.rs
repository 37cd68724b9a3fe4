//! Interpreter pool facade

use crate::core::future;
use crate::core::task::run_guarded;
use crate::core::{
    BoxedTask, FutureStatus, PoolError, PrioritizedTask, Result, TaskFuture, TaskPriority,
    TaskResult,
};
use crate::pool::config::PoolConfig;
use crate::pool::guard::InterpreterGuard;
use crate::pool::slots::SlotAllocator;
use crate::pool::state::{PoolShared, PoolState};
use crate::pool::stats::PoolStats;
use crate::pool::worker::{Worker, WorkerState};
use crate::runtime::ScriptRuntime;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rhai::{Array, Dynamic, Map};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bounded pool of interpreter slots with a priority task scheduler.
///
/// `pool_size` slots bound how many callers may hold the runtime at once,
/// and `worker_threads` workers drain one shared priority queue. Script
/// execution is still serialized by the runtime's single execution lock:
/// slots provide admission and fairness, not parallelism.
///
/// ```rust
/// use interpreter_pool::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let runtime = Arc::new(ScriptRuntime::started());
/// let pool = InterpreterPool::with_runtime(PoolConfig::new(2), runtime)?;
/// pool.initialize()?;
///
/// let result = pool.execute_script("result = 2 + 2", None, None, TaskPriority::Normal).wait();
/// assert!(result.success);
/// assert_eq!(result.value_as::<i64>(), Some(4));
///
/// pool.shutdown(true);
/// # Ok(())
/// # }
/// ```
pub struct InterpreterPool {
    config: PoolConfig,
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<Worker>>,
}

impl std::fmt::Debug for InterpreterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("pending", &self.pending_task_count())
            .finish()
    }
}

impl InterpreterPool {
    /// Create a pool on the process-wide runtime
    pub fn new(config: PoolConfig) -> Result<Self> {
        Self::with_runtime(config, ScriptRuntime::global())
    }

    /// Create a pool on a specific runtime
    pub fn with_runtime(config: PoolConfig, runtime: Arc<ScriptRuntime>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(PoolShared::new(
            runtime,
            config.max_queued_tasks,
            config.task_timeout,
            config.enable_statistics,
        ));

        debug!(
            "Created interpreter pool: {} slots, {} workers",
            config.pool_size,
            config.effective_worker_threads()
        );

        Ok(Self {
            config,
            shared,
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Create the slots and start the workers.
    ///
    /// Idempotent while initialized. Fails with
    /// [`PoolNotInitialized`](PoolError::PoolNotInitialized) when the runtime
    /// has not been started, or when the pool has already been shut down.
    pub fn initialize(&self) -> Result<()> {
        let mut workers = self.workers.lock();

        match self.shared.inner.lock().state {
            PoolState::Uninitialized => {}
            PoolState::Initialized => return Ok(()),
            PoolState::ShuttingDown | PoolState::Stopped => {
                return Err(PoolError::not_initialized(
                    "pool has been shut down and cannot be reinitialized",
                ))
            }
        }

        if !self.shared.runtime.is_started() {
            return Err(PoolError::not_initialized("scripting runtime is not started"));
        }

        if self.config.use_subinterpreters {
            warn!("useSubinterpreters is not supported; execution stays serialized");
        }

        self.shared.inner.lock().slots = SlotAllocator::new(self.config.pool_size);

        if self.config.preload_modules {
            for module in &self.config.modules_to_preload {
                match self.shared.runtime.import_module(module) {
                    Ok(_) => info!("Preloaded module '{}'", module),
                    Err(e) => warn!("Failed to preload module '{}': {}", module, e),
                }
            }
        }

        let num_workers = self.config.effective_worker_threads();
        let mut spawned = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            match Worker::spawn(id, &self.config.thread_name_prefix, Arc::clone(&self.shared)) {
                Ok(worker) => spawned.push(worker),
                Err(e) => {
                    self.abort_initialize(spawned);
                    return Err(e);
                }
            }
        }

        *workers = spawned;
        self.shared.inner.lock().state = PoolState::Initialized;

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(num_workers, self.config.pool_size);

        info!(
            "Interpreter pool initialized: {} slots, {} workers",
            self.config.pool_size, num_workers
        );
        Ok(())
    }

    /// Stop the workers spawned by a failed initialize and reset the pool
    fn abort_initialize(&self, spawned: Vec<Worker>) {
        self.shared.inner.lock().state = PoolState::ShuttingDown;
        self.shared.task_available.notify_all();
        for worker in spawned {
            if let Err(e) = worker.join() {
                warn!("{}", e);
            }
        }
        let mut inner = self.shared.inner.lock();
        inner.slots = SlotAllocator::default();
        inner.state = PoolState::Uninitialized;
    }

    /// Stop intake and join the workers. Idempotent.
    ///
    /// With `wait_for_tasks`, workers drain the queue before exiting.
    /// Without it, pending tasks are discarded and counted as cancelled;
    /// their futures resolve with a cancelled result. Threads blocked in
    /// [`acquire`](Self::acquire) wake with
    /// [`ShutdownInProgress`](PoolError::ShutdownInProgress).
    ///
    /// A caller that still holds an [`InterpreterGuard`] owns the execution
    /// lock, so no queued task could start before the workers are joined.
    /// In that case the queue is discarded even when `wait_for_tasks` is set.
    pub fn shutdown(&self, wait_for_tasks: bool) {
        let holds_execution = self.shared.runtime.is_execution_held_by_current_thread();
        if wait_for_tasks && holds_execution {
            warn!("shutdown(true) called while holding the execution lock; discarding pending tasks");
        }
        let wait_for_tasks = wait_for_tasks && !holds_execution;

        let discarded = {
            let mut inner = self.shared.inner.lock();
            if inner.state != PoolState::Initialized {
                return;
            }
            inner.state = PoolState::ShuttingDown;

            if wait_for_tasks {
                Vec::new()
            } else {
                let discarded = inner.queue.drain();
                self.shared.record_cancelled(&mut inner, discarded.len());
                discarded
            }
        };

        let cancelled = discarded.len();
        // Dropping the tasks drops their promises.
        drop(discarded);

        self.shared.task_available.notify_all();
        self.shared.slot_available.notify_all();

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_cancelled(cancelled);

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.is_current_thread() {
                debug!("Worker {} requested shutdown; not joining itself", worker.id());
                worker.detach();
            } else if let Err(e) = worker.join() {
                warn!("{}", e);
            }
        }

        let stats = {
            let mut inner = self.shared.inner.lock();
            inner.state = PoolState::Stopped;
            self.snapshot(&inner)
        };

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(stats.successful_tasks, stats.failed_tasks);

        info!(
            "Interpreter pool stopped: {} completed, {} failed, {} cancelled at shutdown",
            stats.successful_tasks, stats.failed_tasks, cancelled
        );
    }

    /// Take a free slot and the execution lock, waiting up to `timeout`.
    ///
    /// Fails with [`Timeout`](PoolError::Timeout) when no slot frees up in
    /// time, and with [`LockAcquisitionFailed`](PoolError::LockAcquisitionFailed)
    /// when a slot was free but the execution lock stayed held by another
    /// thread for the rest of the wait.
    pub fn acquire(&self, timeout: Duration) -> Result<InterpreterGuard<'_>> {
        let deadline = Instant::now() + timeout;

        let lease = {
            let mut inner = self.shared.inner.lock();
            inner.check_accepting()?;
            loop {
                if let Some(lease) = inner.slots.take() {
                    break lease;
                }
                let timed_out = self
                    .shared
                    .slot_available
                    .wait_until(&mut inner, deadline)
                    .timed_out();
                // Shutdown began while waiting
                if inner.is_closing() {
                    return Err(PoolError::ShutdownInProgress);
                }
                if timed_out && !inner.slots.has_free() {
                    return Err(PoolError::timeout("acquire", timeout));
                }
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.shared.runtime.try_lock_execution(remaining) {
            Some(execution) => Ok(InterpreterGuard::new(&self.shared, lease, execution)),
            None => {
                self.shared.release_lease(lease);
                Err(PoolError::lock_failed(timeout))
            }
        }
    }

    /// [`acquire`](Self::acquire) with the configured acquire timeout
    pub fn acquire_default(&self) -> Result<InterpreterGuard<'_>> {
        self.acquire(self.config.acquire_timeout)
    }

    /// Take a slot only if one is free right now
    pub fn try_acquire(&self) -> Result<InterpreterGuard<'_>> {
        let lease = {
            let mut inner = self.shared.inner.lock();
            inner.check_accepting()?;
            match inner.slots.take() {
                Some(lease) => lease,
                None => {
                    return Err(PoolError::exhausted(
                        inner.slots.busy_count(),
                        inner.slots.size(),
                    ))
                }
            }
        };

        match self.shared.runtime.try_lock_execution(Duration::ZERO) {
            Some(execution) => Ok(InterpreterGuard::new(&self.shared, lease, execution)),
            None => {
                self.shared.release_lease(lease);
                Err(PoolError::lock_failed(Duration::ZERO))
            }
        }
    }

    /// Return slot `index` to the free set and wake one waiter.
    ///
    /// Guards release themselves; this is for callers that track slots by
    /// index. Fails with [`InvalidInterpreter`](PoolError::InvalidInterpreter)
    /// if the slot is not currently busy.
    pub fn release(&self, index: usize) -> Result<()> {
        self.shared.release_slot(index)
    }

    /// Queue `f` to run on a worker under the execution lock.
    ///
    /// Never blocks. When the pool is not initialized, is shutting down, or
    /// the queue is full, the returned future is already resolved with a
    /// failed result describing why. Errors and panics inside `f` also
    /// arrive as failed results.
    pub fn submit<F, R>(&self, f: F, priority: TaskPriority) -> TaskFuture
    where
        F: FnOnce(&ScriptRuntime) -> Result<R> + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        self.enqueue(f, priority)
            .unwrap_or_else(|e| TaskFuture::ready(TaskResult::rejected(e)))
    }

    fn enqueue<F, R>(&self, f: F, priority: TaskPriority) -> Result<TaskFuture>
    where
        F: FnOnce(&ScriptRuntime) -> Result<R> + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let (promise, future) = future::channel();
        let runtime = Arc::clone(&self.shared.runtime);
        let shared = Arc::downgrade(&self.shared);

        // Workers hold the execution lock while this runs.
        let body: BoxedTask = Box::new(move || {
            let result = run_guarded(|| f(runtime.as_ref()));
            // Counted before the caller can observe the result
            if let Some(shared) = shared.upgrade() {
                shared.record_completion(&result);
            }
            promise.fulfill(result.clone());
            result
        });
        #[cfg(feature = "tracing")]
        let body = crate::tracing::TracedTask::new(body).into_boxed();

        {
            let mut inner = self.shared.inner.lock();
            inner.check_accepting()?;
            if inner.queue.len() >= inner.max_queued_tasks {
                return Err(PoolError::queue_full(inner.queue.len(), inner.max_queued_tasks));
            }

            let sequence = inner.next_sequence();
            inner
                .queue
                .push(PrioritizedTask::new(priority, Instant::now(), sequence, body));

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_submission(inner.queue.len());
        }

        self.shared.task_available.notify_one();
        Ok(future)
    }

    /// Submit `f` at normal priority and wait up to `timeout` for its result.
    ///
    /// A task still pending at the deadline keeps running; only the wait is
    /// abandoned.
    pub fn execute<F, R>(&self, f: F, timeout: Duration) -> Result<TaskResult>
    where
        F: FnOnce(&ScriptRuntime) -> Result<R> + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        let mut future = self.enqueue(f, TaskPriority::Normal)?;
        match future.wait_for(timeout) {
            FutureStatus::Ready => Ok(future.wait()),
            FutureStatus::Timeout => Err(PoolError::timeout("execute", timeout)),
        }
    }

    /// [`execute`](Self::execute) with the current default task timeout
    pub fn execute_with_default_timeout<F, R>(&self, f: F) -> Result<TaskResult>
    where
        F: FnOnce(&ScriptRuntime) -> Result<R> + Send + 'static,
        R: Clone + Send + Sync + 'static,
    {
        self.execute(f, self.default_timeout())
    }

    /// Evaluate script source and deliver its `result` binding
    pub fn execute_script(
        &self,
        source: impl Into<String>,
        globals: Option<Map>,
        locals: Option<Map>,
        priority: TaskPriority,
    ) -> TaskFuture {
        let source = source.into();
        self.submit(
            move |runtime: &ScriptRuntime| -> Result<Dynamic> {
                runtime.eval_script(&source, globals.as_ref(), locals.as_ref())
            },
            priority,
        )
    }

    /// Import `module` and call `function` with positional and keyword arguments
    pub fn execute_function(
        &self,
        module: impl Into<String>,
        function: impl Into<String>,
        args: Array,
        kwargs: Map,
        priority: TaskPriority,
    ) -> TaskFuture {
        let module = module.into();
        let function = function.into();
        self.submit(
            move |runtime: &ScriptRuntime| -> Result<Dynamic> {
                runtime.call_function(&module, &function, args, kwargs)
            },
            priority,
        )
    }

    /// Discard every pending task. Returns how many were discarded.
    ///
    /// Tasks already running are not interrupted.
    pub fn cancel_all_tasks(&self) -> usize {
        let discarded = {
            let mut inner = self.shared.inner.lock();
            let discarded = inner.queue.drain();
            self.shared.record_cancelled(&mut inner, discarded.len());
            discarded
        };

        let count = discarded.len();
        drop(discarded);

        if count > 0 {
            info!("Cancelled {} pending tasks", count);
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_cancelled(count);
        }
        count
    }

    /// Number of tasks waiting in the queue
    pub fn pending_task_count(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Current statistics
    pub fn get_statistics(&self) -> PoolStats {
        let inner = self.shared.inner.lock();
        self.snapshot(&inner)
    }

    fn snapshot(&self, inner: &crate::pool::state::PoolInner) -> PoolStats {
        inner.stats.snapshot(
            inner.queue.len(),
            inner.slots.free_count(),
            inner.slots.busy_count(),
        )
    }

    /// Zero the counters and timings
    pub fn reset_statistics(&self) {
        self.shared.inner.lock().stats.reset();
    }

    /// Change the queue capacity. Tasks already queued are kept.
    pub fn set_max_queue_size(&self, max: usize) {
        self.shared.inner.lock().max_queued_tasks = max;
    }

    /// Current queue capacity
    pub fn max_queue_size(&self) -> usize {
        self.shared.inner.lock().max_queued_tasks
    }

    /// Change the wait used by [`execute_with_default_timeout`](Self::execute_with_default_timeout)
    pub fn set_default_timeout(&self, timeout: Duration) {
        self.shared.inner.lock().task_timeout = timeout;
    }

    /// Current default task timeout
    pub fn default_timeout(&self) -> Duration {
        self.shared.inner.lock().task_timeout
    }

    /// Import a module into the runtime's module cache
    pub fn preload_module(&self, name: &str) -> Result<()> {
        if !self.is_initialized() {
            return Err(PoolError::not_initialized("cannot preload modules before initialize()"));
        }
        self.shared.runtime.import_module(name)?;
        info!("Preloaded module '{}'", name);
        Ok(())
    }

    /// Add a directory to the module search path
    pub fn add_sys_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.is_initialized() {
            warn!("Ignoring search path {} on uninitialized pool", path.display());
            return;
        }
        self.shared.runtime.add_search_path(path);
    }

    /// Set a variable visible to scripts through `env(name)`
    pub fn set_environment_variable(&self, name: &str, value: &str) {
        if !self.is_initialized() {
            warn!("Ignoring environment variable {} on uninitialized pool", name);
            return;
        }
        self.shared.runtime.set_env(name, value);
    }

    /// Current lifecycle state
    pub fn state(&self) -> PoolState {
        self.shared.inner.lock().state
    }

    /// Whether the pool is accepting work
    pub fn is_initialized(&self) -> bool {
        self.state() == PoolState::Initialized
    }

    /// Whether shutdown has started and not yet finished
    pub fn is_shutting_down(&self) -> bool {
        self.state() == PoolState::ShuttingDown
    }

    /// Free slots
    pub fn available_count(&self) -> usize {
        self.shared.inner.lock().slots.free_count()
    }

    /// Held slots
    pub fn busy_count(&self) -> usize {
        self.shared.inner.lock().slots.busy_count()
    }

    /// Configured number of slots
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Number of running worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// State of each worker, by worker id
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.lock().iter().map(Worker::state).collect()
    }

    /// The runtime tasks execute on
    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.shared.runtime
    }

    /// The configuration this pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Drop for InterpreterPool {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn pool_with(config: PoolConfig) -> InterpreterPool {
        let runtime = Arc::new(ScriptRuntime::started());
        InterpreterPool::with_runtime(config, runtime).expect("Failed to create pool")
    }

    fn started_pool(size: usize) -> InterpreterPool {
        let pool = pool_with(PoolConfig::new(size));
        pool.initialize().expect("Failed to initialize pool");
        pool
    }

    #[test]
    fn test_pool_creation() {
        let pool = pool_with(PoolConfig::new(3));
        assert_eq!(pool.state(), PoolState::Uninitialized);
        assert_eq!(pool.worker_count(), 0);

        pool.initialize().expect("Failed to initialize pool");
        assert!(pool.is_initialized());
        assert_eq!(pool.worker_count(), 3);
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.pool_size(), 3);

        pool.shutdown(true);
        assert_eq!(pool.state(), PoolState::Stopped);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let pool = started_pool(2);
        pool.initialize().expect("second initialize should succeed");
        assert_eq!(pool.worker_count(), 2);
    }

    #[test]
    fn test_initialize_requires_started_runtime() {
        let runtime = Arc::new(ScriptRuntime::new());
        let pool = InterpreterPool::with_runtime(PoolConfig::new(1), Arc::clone(&runtime)).unwrap();

        let err = pool.initialize().unwrap_err();
        assert!(matches!(err, PoolError::PoolNotInitialized { .. }));
        assert_eq!(pool.state(), PoolState::Uninitialized);

        runtime.start();
        pool.initialize().expect("initialize after start");
    }

    #[test]
    fn test_initialize_after_shutdown_fails() {
        let pool = started_pool(1);
        pool.shutdown(true);
        assert!(matches!(
            pool.initialize(),
            Err(PoolError::PoolNotInitialized { .. })
        ));
    }

    #[test]
    fn test_worker_threads_override() {
        let pool = pool_with(PoolConfig::new(4).with_worker_threads(1));
        pool.initialize().unwrap();
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.worker_states().len(), 1);
    }

    #[test]
    fn test_task_execution() {
        let pool = started_pool(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..10)
            .map(|_| {
                let counter_clone = Arc::clone(&counter);
                pool.submit(
                    move |_: &ScriptRuntime| {
                        counter_clone.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    },
                    TaskPriority::Normal,
                )
            })
            .collect();

        for future in futures {
            assert!(future.wait().success);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 10);

        let stats = pool.get_statistics();
        assert_eq!(stats.total_tasks, 10);
        assert_eq!(stats.successful_tasks, 10);
        assert_eq!(stats.current_queued_tasks, 0);
    }

    #[test]
    fn test_submit_when_not_initialized() {
        let pool = pool_with(PoolConfig::new(1));
        let result = pool.submit(|_: &ScriptRuntime| Ok(1_i64), TaskPriority::High).wait();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not initialized"));
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = started_pool(1);
        pool.shutdown(true);

        let result = pool.submit(|_: &ScriptRuntime| Ok(()), TaskPriority::Normal).wait();
        assert!(!result.success);
        assert!(matches!(
            pool.execute(|_: &ScriptRuntime| Ok(()), Duration::from_secs(1)),
            Err(PoolError::PoolNotInitialized { .. })
        ));
    }

    #[test]
    fn test_error_handling() {
        let pool = started_pool(1);

        let failed = pool
            .execute(
                |_: &ScriptRuntime| -> Result<()> { Err(PoolError::execution("bad input")) },
                Duration::from_secs(5),
            )
            .expect("execute should deliver a result");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("Execution failed: bad input"));

        let panicked = pool
            .execute(
                |_: &ScriptRuntime| -> Result<()> { panic!("Intentional panic for testing") },
                Duration::from_secs(5),
            )
            .unwrap();
        assert!(!panicked.success);

        // Workers survive both
        let ok = pool
            .execute(|_: &ScriptRuntime| Ok(5_i64), Duration::from_secs(5))
            .unwrap();
        assert_eq!(ok.value_as::<i64>(), Some(5));

        let stats = pool.get_statistics();
        assert_eq!(stats.failed_tasks, 2);
        assert_eq!(stats.successful_tasks, 1);
    }

    #[test]
    fn test_execute_times_out_but_task_completes() {
        let pool = started_pool(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let err = pool
            .execute(
                move |_: &ScriptRuntime| {
                    thread::sleep(Duration::from_millis(100));
                    let _ = done_tx.send(());
                    Ok(())
                },
                Duration::from_millis(10),
            )
            .unwrap_err();
        assert!(err.is_timeout());

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("abandoned task should still run");
    }

    #[test]
    fn test_queue_full_rejects_without_blocking() {
        let pool = pool_with(PoolConfig::new(1).with_max_queued_tasks(2));
        pool.initialize().unwrap();

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

        let blocker = pool.submit(
            move |_: &ScriptRuntime| {
                started_tx.send(()).unwrap();
                let _ = done_rx.recv();
                Ok(())
            },
            TaskPriority::Normal,
        );
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("Blocking task should start");

        let queued: Vec<_> = (0..2)
            .map(|_| pool.submit(|_: &ScriptRuntime| Ok(()), TaskPriority::Low))
            .collect();
        assert_eq!(pool.pending_task_count(), 2);

        let mut rejected = pool.submit(|_: &ScriptRuntime| Ok(()), TaskPriority::Critical);
        assert!(rejected.is_ready());
        let rejected = rejected.wait();
        assert!(!rejected.success);
        assert!(rejected.error.unwrap().to_lowercase().contains("queue full"));

        let _ = done_tx.send(());
        assert!(blocker.wait().success);
        for future in queued {
            assert!(future.wait().success);
        }
    }

    #[test]
    fn test_cancel_all_tasks() {
        let pool = started_pool(1);

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let blocker = pool.submit(
            move |_: &ScriptRuntime| {
                started_tx.send(()).unwrap();
                let _ = done_rx.recv();
                Ok(())
            },
            TaskPriority::Normal,
        );
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let pending: Vec<_> = (0..3)
            .map(|_| pool.submit(|_: &ScriptRuntime| Ok(()), TaskPriority::Normal))
            .collect();

        assert_eq!(pool.cancel_all_tasks(), 3);
        assert_eq!(pool.pending_task_count(), 0);
        assert_eq!(pool.cancel_all_tasks(), 0);

        for future in pending {
            let result = future.wait();
            assert!(!result.success);
            assert!(result.error.unwrap().contains("cancelled"));
        }

        let _ = done_tx.send(());
        assert!(blocker.wait().success);
        assert_eq!(pool.get_statistics().cancelled_tasks, 3);
    }

    #[test]
    fn test_acquire_and_release() {
        let pool = started_pool(2);

        let mut guard = pool.acquire(Duration::from_millis(100)).expect("acquire");
        assert!(guard.is_valid());
        assert_eq!(pool.busy_count(), 1);
        assert_eq!(pool.available_count(), 1);

        guard.release();
        guard.release();
        assert!(!guard.is_valid());
        assert_eq!(pool.busy_count(), 0);
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_stale_guard_keeps_reissued_slot() {
        let pool = started_pool(1);

        let mut first = pool.acquire(Duration::from_millis(100)).unwrap();
        pool.release(first.index()).expect("direct release of a held slot");
        let second = pool.acquire(Duration::ZERO).expect("slot was handed back");
        assert_eq!(second.index(), first.index());

        first.release();
        assert!(second.is_valid());
        assert_eq!(pool.busy_count(), 1);
        assert!(pool.acquire(Duration::ZERO).unwrap_err().is_timeout());

        drop(second);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_release_invalid_index() {
        let pool = started_pool(2);
        assert!(matches!(
            pool.release(0),
            Err(PoolError::InvalidInterpreter { index: 0, pool_size: 2 })
        ));
        assert!(pool.release(9).is_err());
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn test_acquire_zero_timeout_on_full_pool() {
        let pool = started_pool(1);
        let _guard = pool.acquire(Duration::from_millis(100)).unwrap();

        // Same thread: the execution lock is reentrant, the slot is not.
        let start = Instant::now();
        let err = pool.acquire(Duration::ZERO).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_millis(500));

        assert!(matches!(
            pool.try_acquire(),
            Err(PoolError::PoolExhausted { busy: 1, total: 1 })
        ));
    }

    #[test]
    fn test_acquire_before_initialize() {
        let pool = pool_with(PoolConfig::new(1));
        assert!(matches!(
            pool.acquire(Duration::ZERO),
            Err(PoolError::PoolNotInitialized { .. })
        ));
    }

    #[test]
    fn test_task_may_acquire_slot() {
        let pool = Arc::new(started_pool(1));
        let pool_clone = Arc::clone(&pool);

        let result = pool
            .execute(
                move |_: &ScriptRuntime| {
                    let guard = pool_clone.acquire(Duration::from_secs(1))?;
                    let value = guard.runtime().eval_expression("6 * 7");
                    value
                },
                Duration::from_secs(5),
            )
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.value_as::<i64>(), Some(42));
    }

    #[test]
    fn test_shutdown_without_wait_cancels_queue() {
        let pool = started_pool(1);

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let blocker = pool.submit(
            move |_: &ScriptRuntime| {
                started_tx.send(()).unwrap();
                let _ = done_rx.recv();
                Ok(())
            },
            TaskPriority::Normal,
        );
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let pending: Vec<_> = (0..4)
            .map(|_| {
                let ran = Arc::clone(&ran);
                pool.submit(
                    move |_: &ScriptRuntime| {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    TaskPriority::Normal,
                )
            })
            .collect();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = done_tx.send(());
        });
        pool.shutdown(false);
        releaser.join().unwrap();

        assert!(blocker.wait().success);
        for future in pending {
            assert!(!future.wait().success);
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.get_statistics().cancelled_tasks, 4);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = started_pool(2);
        pool.shutdown(true);
        pool.shutdown(false);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_statistics_disabled() {
        let pool = pool_with(PoolConfig::new(1).with_statistics(false));
        pool.initialize().unwrap();

        pool.execute(|_: &ScriptRuntime| Ok(()), Duration::from_secs(5))
            .unwrap();
        let stats = pool.get_statistics();
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.available_interpreters, 1);
    }

    #[test]
    fn test_statistics_visible_once_result_arrives() {
        let pool = started_pool(2);
        for expected in 1..=100_u64 {
            let result = pool.submit(|_: &ScriptRuntime| Ok(()), TaskPriority::Normal).wait();
            assert!(result.success);
            assert_eq!(pool.get_statistics().total_tasks, expected);
        }
    }

    #[test]
    fn test_reset_statistics() {
        let pool = started_pool(1);
        pool.execute(|_: &ScriptRuntime| Ok(()), Duration::from_secs(5))
            .unwrap();
        assert_eq!(pool.get_statistics().total_tasks, 1);

        pool.reset_statistics();
        let stats = pool.get_statistics();
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.average_execution_time_ms, 0.0);
    }

    #[test]
    fn test_runtime_configuration() {
        let pool = started_pool(1);
        pool.set_max_queue_size(5);
        assert_eq!(pool.max_queue_size(), 5);
        pool.set_default_timeout(Duration::from_millis(750));
        assert_eq!(pool.default_timeout(), Duration::from_millis(750));

        pool.set_environment_variable("DEVICE_NAME", "mount-1");
        let result = pool
            .execute_script(r#"result = env("DEVICE_NAME")"#, None, None, TaskPriority::Normal)
            .wait();
        assert_eq!(result.value.into_string().unwrap(), "mount-1");
    }

    #[test]
    fn test_preload_module() {
        let pool = pool_with(PoolConfig::new(1));
        assert!(pool.preload_module("missing").is_err());

        pool.runtime()
            .register_module("math", "fn double(x) { x * 2 }")
            .unwrap();
        pool.initialize().unwrap();
        pool.preload_module("math").expect("registered module should preload");
        assert!(matches!(
            pool.preload_module("missing"),
            Err(PoolError::ExecutionFailed { .. })
        ));

        let result = pool
            .execute_function("math", "double", vec![Dynamic::from(21_i64)], Map::new(), TaskPriority::High)
            .wait();
        assert_eq!(result.value_as::<i64>(), Some(42));
    }

    #[test]
    fn test_drop_shuts_down() {
        let pool = started_pool(2);
        let future = pool.submit(|_: &ScriptRuntime| Ok(1_i64), TaskPriority::Normal);
        drop(pool);
        // Either ran before the drop or was discarded; never hangs.
        let _ = future.wait();
    }
}
