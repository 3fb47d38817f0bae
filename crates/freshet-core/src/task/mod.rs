//! # Task System
//!
//! Schedulable units of work and the machinery that runs them.
//!
//! A [`Task`] wraps a runnable body with a priority index and a small state
//! machine. Tasks flow through a multi-priority [`TaskQueue`] and are run by
//! a [`RoundExecutor`], which batches execution into *rounds* sized by the
//! queue length at round start. Work enqueued during a round runs in the
//! next round, so a task that re-enqueues itself cannot monopolize the
//! executor; exceeding the round budget is reported as a *runaway*.
//!
//! ## Task lifecycle
//!
//! ```text
//!          enqueue          dequeue           body returns
//! Idle ────────────► Queued ───────► Executing ───────────► Idle
//!   ▲                                    │                   │
//!   │                                    │ periodic          │
//!   │                                    ▼                   │
//!   └───────────────────────────────── Queued ◄──────────────┘
//!
//! cancel() moves any state to Disposed; disposed tasks popped by the
//! executor are skipped.
//! ```

mod executor;
mod queue;

pub use executor::{ExecutorPoll, RoundExecutor};
pub use queue::TaskQueue;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config;

/// Execution state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not queued and not executing.
    Idle,
    /// Waiting in a task queue.
    Queued,
    /// Currently being executed.
    Executing,
    /// Cancelled; will never run again.
    Disposed,
}

struct TaskInner {
    /// Debug name, recorded only when `names_enabled`.
    name: Option<Rc<str>>,
    /// Priority index; lower is higher priority.
    priority: usize,
    /// Whether the executor re-enqueues this task after each run.
    periodic: bool,
    state: Cell<TaskState>,
    body: RefCell<Box<dyn FnMut()>>,
}

/// A schedulable unit: a runnable body with a priority and a state machine.
///
/// `Task` is a cheap shared handle; clones refer to the same task. A task
/// may not be enqueued twice concurrently (enforced by [`TaskQueue`]), and
/// [`Task::cancel`] permanently disposes it.
#[derive(Clone)]
pub struct Task {
    inner: Rc<TaskInner>,
}

impl Task {
    /// Creates a one-shot task at the given priority.
    #[must_use]
    pub fn new(name: &str, priority: usize, body: impl FnMut() + 'static) -> Self {
        Self::build(name, priority, false, body)
    }

    /// Creates a periodic task; the executor re-enqueues it after each run
    /// until it is cancelled.
    #[must_use]
    pub fn new_periodic(name: &str, priority: usize, body: impl FnMut() + 'static) -> Self {
        Self::build(name, priority, true, body)
    }

    fn build(name: &str, priority: usize, periodic: bool, body: impl FnMut() + 'static) -> Self {
        let name = config::get().names_enabled.then(|| Rc::from(name));
        Self {
            inner: Rc::new(TaskInner {
                name,
                priority,
                periodic,
                state: Cell::new(TaskState::Idle),
                body: RefCell::new(Box::new(body)),
            }),
        }
    }

    /// Returns the debug name, when names are enabled.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the priority index; lower is higher priority.
    #[inline]
    #[must_use]
    pub fn priority(&self) -> usize {
        self.inner.priority
    }

    /// Returns true for tasks the executor re-enqueues after each run.
    #[inline]
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.inner.periodic
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.inner.state.get()
    }

    /// Returns true once the task has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == TaskState::Disposed
    }

    /// Cancels the task. Idempotent; a disposed task popped by the executor
    /// is skipped without running.
    pub fn cancel(&self) {
        self.inner.state.set(TaskState::Disposed);
    }

    /// Runs the task body once.
    pub(crate) fn run(&self) {
        (self.inner.body.borrow_mut())();
    }

    pub(crate) fn mark_queued(&self) {
        if !self.is_disposed() {
            self.inner.state.set(TaskState::Queued);
        }
    }

    pub(crate) fn mark_executing(&self) {
        if !self.is_disposed() {
            self.inner.state.set(TaskState::Executing);
        }
    }

    /// Marks the task as having been executed, returning it to idle unless
    /// it was disposed in the meantime.
    pub(crate) fn mark_executed(&self) {
        if !self.is_disposed() {
            self.inner.state.set(TaskState::Idle);
        }
    }

    pub(crate) fn mark_idle(&self) {
        if !self.is_disposed() {
            self.inner.state.set(TaskState::Idle);
        }
    }

    /// Identity comparison; two handles are equal when they refer to the
    /// same task.
    #[must_use]
    pub fn same_task(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.same_task(other)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .field("state", &self.state())
            .field("periodic", &self.is_periodic())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_initial_state() {
        let task = Task::new("t", 0, || {});
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.priority(), 0);
        assert!(!task.is_periodic());
    }

    #[test]
    fn test_task_runs_body() {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let task = Task::new("count", 1, move || counter.set(counter.get() + 1));
        task.run();
        task.run();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_cancel_is_idempotent_and_sticky() {
        let task = Task::new("t", 0, || {});
        task.cancel();
        assert!(task.is_disposed());
        task.cancel();
        assert!(task.is_disposed());
        // State marks do not resurrect a disposed task.
        task.mark_queued();
        assert_eq!(task.state(), TaskState::Disposed);
        task.mark_executed();
        assert_eq!(task.state(), TaskState::Disposed);
    }

    #[test]
    fn test_clone_shares_identity() {
        let task = Task::new("t", 0, || {});
        let other = task.clone();
        assert!(task.same_task(&other));
        other.cancel();
        assert!(task.is_disposed());
    }
}
