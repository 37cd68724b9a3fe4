//! One-shot promise/future pair for task results
//!
//! A [`TaskPromise`] is moved into the queued task and fulfilled exactly once
//! (fulfilling consumes it). The caller keeps the matching [`TaskFuture`].
//! If the promise is dropped unfulfilled, because the task was discarded
//! before it ran, the future resolves to a cancelled [`TaskResult`] instead
//! of waiting forever.

use crate::core::error::PoolError;
use crate::core::task::TaskResult;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Create a connected promise/future pair
pub fn channel() -> (TaskPromise, TaskFuture) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    (
        TaskPromise { sender },
        TaskFuture {
            receiver: Some(receiver),
            result: None,
        },
    )
}

/// Write side of a task result
#[derive(Debug)]
pub struct TaskPromise {
    sender: Sender<TaskResult>,
}

impl TaskPromise {
    /// Deliver the result. A caller that dropped its future is ignored.
    pub fn fulfill(self, result: TaskResult) {
        let _ = self.sender.send(result);
    }
}

/// Status returned by [`TaskFuture::wait_for`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// The result is available
    Ready,
    /// The wait expired before a result arrived
    Timeout,
}

/// Read side of a task result
#[derive(Debug)]
pub struct TaskFuture {
    receiver: Option<Receiver<TaskResult>>,
    result: Option<TaskResult>,
}

impl TaskFuture {
    /// A future that is already resolved
    pub fn ready(result: TaskResult) -> Self {
        Self {
            receiver: None,
            result: Some(result),
        }
    }

    /// Check for a result without blocking
    pub fn is_ready(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(result) => self.store(result),
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => self.store(cancelled_result()),
        }
    }

    /// Block up to `timeout` for the result
    pub fn wait_for(&mut self, timeout: Duration) -> FutureStatus {
        if self.result.is_some() {
            return FutureStatus::Ready;
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return FutureStatus::Timeout;
        };
        let resolved = match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return FutureStatus::Timeout,
            Err(RecvTimeoutError::Disconnected) => cancelled_result(),
        };
        self.store(resolved);
        FutureStatus::Ready
    }

    /// Block until the result is available and take it
    pub fn wait(mut self) -> TaskResult {
        if let Some(result) = self.result.take() {
            return result;
        }
        match self.receiver.take().map(|r| r.recv()) {
            Some(Ok(result)) => result,
            _ => cancelled_result(),
        }
    }

    /// Take the result if it is already available
    pub fn try_take(&mut self) -> Option<TaskResult> {
        if self.is_ready() {
            self.result.take()
        } else {
            None
        }
    }

    fn store(&mut self, result: TaskResult) -> bool {
        self.result = Some(result);
        self.receiver = None;
        true
    }
}

fn cancelled_result() -> TaskResult {
    TaskResult::rejected(PoolError::cancelled("task discarded before execution"))
}
