//! Scoped slot acquisition

use crate::pool::slots::SlotLease;
use crate::pool::state::PoolShared;
use crate::runtime::{ExecutionGuard, ScriptRuntime};

/// A held interpreter slot plus the global execution lock.
///
/// Returned by [`InterpreterPool::acquire`](crate::InterpreterPool::acquire).
/// Dropping the guard (or calling [`release`](Self::release)) releases the
/// execution lock first and then returns the slot. Release happens at most
/// once. The guard is neither `Clone` nor `Send`: the execution lock must be
/// released on the thread that took it.
///
/// ```rust
/// use interpreter_pool::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let runtime = Arc::new(ScriptRuntime::started());
/// let pool = InterpreterPool::with_runtime(PoolConfig::new(2), runtime)?;
/// pool.initialize()?;
///
/// {
///     let guard = pool.acquire(Duration::from_millis(100))?;
///     let value = guard.runtime().eval_expression("40 + 2")?;
///     assert_eq!(value.as_int().ok(), Some(42));
///     assert_eq!(pool.busy_count(), 1);
/// }
/// assert_eq!(pool.busy_count(), 0);
/// # pool.shutdown(true);
/// # Ok(())
/// # }
/// ```
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct InterpreterGuard<'a> {
    shared: &'a PoolShared,
    lease: SlotLease,
    execution: Option<ExecutionGuard<'a>>,
    valid: bool,
}

impl<'a> InterpreterGuard<'a> {
    pub(crate) fn new(shared: &'a PoolShared, lease: SlotLease, execution: ExecutionGuard<'a>) -> Self {
        Self {
            shared,
            lease,
            execution: Some(execution),
            valid: true,
        }
    }

    /// Slot index held by this guard
    pub fn index(&self) -> usize {
        self.lease.index
    }

    /// False once the guard has been released
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The runtime this slot executes on
    pub fn runtime(&self) -> &ScriptRuntime {
        &self.shared.runtime
    }

    /// Release the execution lock and the slot. Later calls do nothing.
    ///
    /// If the slot was already handed back through
    /// [`InterpreterPool::release`](crate::InterpreterPool::release), it is
    /// left alone, even when another guard now holds it.
    pub fn release(&mut self) {
        if !self.valid {
            return;
        }
        self.valid = false;

        // Lock before slot.
        drop(self.execution.take());
        if !self.shared.release_lease(self.lease) {
            log::debug!("Slot {} was released externally", self.lease.index);
        }
    }
}

impl Drop for InterpreterGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for InterpreterGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterGuard")
            .field("index", &self.lease.index)
            .field("valid", &self.valid)
            .finish()
    }
}
