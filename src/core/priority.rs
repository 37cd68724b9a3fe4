//! Priority-based task ordering
//!
//! Pop order is a strict total order: priority descending, then submission
//! time ascending, then sequence number ascending. The sequence number is
//! assigned under the same lock that stamps the submission time, so two
//! tasks never compare equal and the heap's own tie handling never matters.

use super::task::BoxedTask;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Task priority levels (higher number = higher priority)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum TaskPriority {
    /// Lowest priority - background work
    Low = 0,
    /// Normal priority - default for most tasks
    #[default]
    Normal = 1,
    /// High priority - interactive requests
    High = 2,
    /// Critical priority - must be executed ASAP
    Critical = 3,
}

impl TaskPriority {
    /// Get the numeric value of the priority
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

/// A queued task with its scheduling keys
pub struct PrioritizedTask {
    pub(crate) priority: TaskPriority,
    pub(crate) submit_time: Instant,
    pub(crate) sequence: u64,
    pub(crate) task: BoxedTask,
}

impl PrioritizedTask {
    /// Create a new prioritized task
    pub fn new(priority: TaskPriority, submit_time: Instant, sequence: u64, task: BoxedTask) -> Self {
        Self {
            priority,
            submit_time,
            sequence,
            task,
        }
    }

    /// Get the priority of this task
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Get the sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Unwrap into the runnable task body
    pub fn into_task(self) -> BoxedTask {
        self.task
    }
}

impl std::fmt::Debug for PrioritizedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrioritizedTask")
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrioritizedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PrioritizedTask {}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: "greater" pops first, so the time and
        // sequence comparisons are reversed to give FIFO within a priority.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.submit_time.cmp(&self.submit_time))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Max-heap of pending tasks
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<PrioritizedTask>,
}

impl TaskQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Push a task onto the queue
    pub fn push(&mut self, task: PrioritizedTask) {
        self.heap.push(task);
    }

    /// Pop the next task in scheduling order
    pub fn pop(&mut self) -> Option<PrioritizedTask> {
        self.heap.pop()
    }

    /// Peek at the next task without removing it
    pub fn peek(&self) -> Option<&PrioritizedTask> {
        self.heap.peek()
    }

    /// Get the number of pending tasks
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every pending task, returning them so the caller can drop
    /// them outside of any lock.
    pub fn drain(&mut self) -> Vec<PrioritizedTask> {
        std::mem::take(&mut self.heap).into_vec()
    }
}
