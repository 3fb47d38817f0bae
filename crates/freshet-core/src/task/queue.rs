//! Multi-priority task queue.
//!
//! One FIFO buffer per priority; dequeue scans priorities low index to high
//! and always returns the head of the first non-empty buffer.

use crate::buffer::CircularBuffer;
use crate::config;

use super::Task;

/// A FIFO task queue with strict highest-priority-first dequeue.
pub struct TaskQueue {
    /// A buffer per priority holding tasks that are queued but not
    /// executing.
    buffers: Vec<CircularBuffer<Task>>,
}

impl TaskQueue {
    /// Creates a queue supporting `priority_count` priorities, each backed
    /// by a buffer with `initial_capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if either argument is 0.
    #[must_use]
    pub fn new(priority_count: usize, initial_capacity: usize) -> Self {
        assert!(priority_count > 0, "priority_count must be > 0");
        assert!(initial_capacity > 0, "initial_capacity must be > 0");
        Self {
            buffers: (0..priority_count)
                .map(|_| CircularBuffer::new(initial_capacity))
                .collect(),
        }
    }

    /// Returns the number of priorities handled by the queue.
    #[must_use]
    pub fn priority_count(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the total number of queued tasks across all priorities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.iter().map(CircularBuffer::len).sum()
    }

    /// Returns true when no task is queued at any priority.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(CircularBuffer::is_empty)
    }

    /// Adds the task at the tail of its priority's buffer and marks it
    /// queued.
    ///
    /// The task must not already be in the queue.
    ///
    /// # Panics
    ///
    /// Panics under `check_invariants` when the task is already queued or
    /// its priority is out of range.
    pub fn enqueue(&mut self, task: Task) {
        self.check_enqueue(&task);
        task.mark_queued();
        let priority = task.priority();
        self.buffers[priority].add(task);
    }

    /// Adds the task at the *head* of the highest priority buffer and marks
    /// it queued, so it is the next task dequeued.
    ///
    /// # Panics
    ///
    /// Panics under `check_invariants` when the task is already queued.
    pub fn enqueue_next(&mut self, task: Task) {
        self.check_enqueue(&task);
        task.mark_queued();
        self.buffers[0].add_first(task);
    }

    /// Removes and returns the head of the first non-empty priority buffer,
    /// marking it executing.
    pub fn dequeue(&mut self) -> Option<Task> {
        for buffer in &mut self.buffers {
            if let Some(task) = buffer.pop() {
                task.mark_executing();
                return Some(task);
            }
        }
        None
    }

    /// Empties all priority buffers, marking each removed task idle, and
    /// returns the removed tasks in priority order.
    pub fn clear(&mut self) -> Vec<Task> {
        let mut removed = Vec::new();
        for buffer in &mut self.buffers {
            while let Some(task) = buffer.pop() {
                task.mark_idle();
                removed.push(task);
            }
        }
        removed
    }

    /// Returns the names of queued tasks in dequeue order, for diagnostics.
    #[must_use]
    pub fn ordered_task_names(&self) -> Vec<String> {
        self.buffers
            .iter()
            .flat_map(CircularBuffer::iter)
            .map(|task| task.name().unwrap_or("<unnamed>").to_string())
            .collect()
    }

    fn check_enqueue(&self, task: &Task) {
        if !config::get().check_invariants {
            return;
        }
        assert!(
            !self.buffers.iter().any(|buffer| buffer.contains(task)),
            "attempting to queue task {task:?} when it is already queued"
        );
        assert!(
            task.priority() < self.buffers.len(),
            "task {task:?} has priority {} but the queue supports {} priorities",
            task.priority(),
            self.buffers.len()
        );
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("priority_count", &self.priority_count())
            .field("len", &self.len())
            .finish()
    }
}
