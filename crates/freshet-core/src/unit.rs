//! # Processor Unit
//!
//! A single-threaded execution context owning a round-based task executor
//! and a [`Scheduler`].
//!
//! Activation is the only place task bodies run. Activating a unit stores
//! it in a thread-local *current unit* slot, drains work, then clears the
//! slot; nesting activations is forbidden and asserted. Code running inside
//! a task body can therefore call [`ProcessorUnit::current`] and rely on it
//! being this unit.
//!
//! ```rust
//! use freshet_core::task::Task;
//! use freshet_core::unit::ProcessorUnit;
//!
//! let unit = ProcessorUnit::new("worker");
//! unit.queue(Task::new("probe", 0, || {
//!     assert!(ProcessorUnit::current().is_some());
//! }));
//! unit.drain();
//! assert!(ProcessorUnit::current().is_none());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::config;
use crate::scheduler::Scheduler;
use crate::task::{ExecutorPoll, RoundExecutor, Task};

thread_local! {
    static CURRENT_UNIT: RefCell<Option<ProcessorUnit>> = const { RefCell::new(None) };
}

struct UnitInner {
    /// Debug name, recorded only when `names_enabled`.
    name: Option<Rc<str>>,
    executor: RefCell<RoundExecutor>,
    scheduler: Scheduler,
}

/// A cooperative single-threaded processor unit.
///
/// `ProcessorUnit` is a cheap shared handle; clones refer to the same unit.
#[derive(Clone)]
pub struct ProcessorUnit {
    inner: Rc<UnitInner>,
}

impl ProcessorUnit {
    /// Creates a unit configured from the process-wide [`Config`].
    ///
    /// [`Config`]: crate::config::Config
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            inner: Rc::new(UnitInner {
                name: config::get().names_enabled.then(|| Rc::from(name)),
                executor: RefCell::new(RoundExecutor::from_config()),
                scheduler: Scheduler::new(),
            }),
        }
    }

    /// Returns the unit's debug name, when names are enabled.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the unit currently activated on this thread, if any.
    #[must_use]
    pub fn current() -> Option<ProcessorUnit> {
        CURRENT_UNIT.with(|slot| slot.borrow().clone())
    }

    /// Returns a handle to this unit's scheduler.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.inner.scheduler.clone()
    }

    /// Queues a task for execution on this unit.
    pub fn queue(&self, task: Task) {
        self.inner.executor.borrow_mut().queue_mut().enqueue(task);
    }

    /// Queues a task at the head of the queue, to run before anything else
    /// already queued.
    pub fn queue_next(&self, task: Task) {
        self.inner
            .executor
            .borrow_mut()
            .queue_mut()
            .enqueue_next(task);
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn queued_tasks(&self) -> usize {
        self.inner.executor.borrow().queue().len()
    }

    /// Activates the unit and runs queued tasks until the queue is idle or
    /// runaway tasks are detected.
    ///
    /// # Panics
    ///
    /// Panics when called while any unit is already activated on this
    /// thread.
    pub fn drain(&self) {
        self.activate(|| self.run_queued_tasks());
    }

    /// Activates the unit, advances its scheduler clock by `delta` (firing
    /// due timers), then runs queued tasks.
    ///
    /// # Panics
    ///
    /// Panics when called while any unit is already activated on this
    /// thread.
    pub fn advance_clock(&self, delta: u64) {
        self.activate(|| {
            self.inner.scheduler.advance_by(delta);
            self.run_queued_tasks();
        });
    }

    /// Like [`advance_clock`](Self::advance_clock) but advances to an
    /// absolute scheduler time.
    ///
    /// # Panics
    ///
    /// Panics when called while any unit is already activated on this
    /// thread.
    pub fn advance_clock_to(&self, target: u64) {
        self.activate(|| {
            self.inner.scheduler.advance_to(target);
            self.run_queued_tasks();
        });
    }

    /// Runs queued tasks via the poll/complete pair so task bodies may
    /// queue further work on this unit.
    fn run_queued_tasks(&self) {
        loop {
            let poll = self.inner.executor.borrow_mut().poll();
            match poll {
                ExecutorPoll::Run(task) => {
                    task.run();
                    self.inner.executor.borrow_mut().complete_task(&task);
                }
                ExecutorPoll::Idle | ExecutorPoll::Runaway => break,
            }
        }
    }

    /// Sets the current-unit slot, runs `body`, and clears the slot again
    /// (also on unwind).
    fn activate<R>(&self, body: impl FnOnce() -> R) -> R {
        struct SlotGuard;
        impl Drop for SlotGuard {
            fn drop(&mut self) {
                CURRENT_UNIT.with(|slot| *slot.borrow_mut() = None);
            }
        }

        CURRENT_UNIT.with(|slot| {
            let mut current = slot.borrow_mut();
            assert!(
                current.is_none(),
                "nested processor unit activation: a unit is already active on this thread"
            );
            *current = Some(self.clone());
        });
        let _guard = SlotGuard;
        body()
    }
}

impl std::fmt::Debug for ProcessorUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorUnit")
            .field("name", &self.name())
            .field("queued_tasks", &self.queued_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_drain_runs_queued_tasks() {
        let unit = ProcessorUnit::new("test");
        let ran = Rc::new(Cell::new(0u32));
        for _ in 0..3 {
            let counter = Rc::clone(&ran);
            unit.queue(Task::new("inc", 0, move || counter.set(counter.get() + 1)));
        }
        unit.drain();
        assert_eq!(ran.get(), 3);
        assert_eq!(unit.queued_tasks(), 0);
    }

    #[test]
    fn test_current_unit_visible_in_task_body() {
        let unit = ProcessorUnit::new("visible");
        let observed: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&observed);
        unit.queue(Task::new("probe", 0, move || {
            let current = ProcessorUnit::current().expect("current unit inside task body");
            *slot.borrow_mut() = current.name().map(str::to_string);
        }));
        unit.drain();
        assert_eq!(observed.borrow().as_deref(), Some("visible"));
        assert!(ProcessorUnit::current().is_none());
    }

    #[test]
    fn test_task_body_may_queue_more_work() {
        let unit = ProcessorUnit::new("requeue");
        let ran_second = Rc::new(Cell::new(false));

        let flag = Rc::clone(&ran_second);
        let chained = {
            let unit = unit.clone();
            move || {
                let flag = Rc::clone(&flag);
                unit.queue(Task::new("second", 0, move || flag.set(true)));
            }
        };
        unit.queue(Task::new("first", 0, chained));
        unit.drain();
        assert!(ran_second.get());
    }

    #[test]
    fn test_queue_next_runs_first() {
        let unit = ProcessorUnit::new("ordering");
        let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let log = Rc::clone(&log);
            unit.queue(Task::new(name, 0, move || log.borrow_mut().push(name)));
        }
        {
            let log = Rc::clone(&log);
            unit.queue_next(Task::new("urgent", 0, move || {
                log.borrow_mut().push("urgent");
            }));
        }
        unit.drain();
        assert_eq!(*log.borrow(), vec!["urgent", "a", "b"]);
    }

    #[test]
    fn test_nested_activation_panics() {
        let unit = ProcessorUnit::new("outer");
        let inner = ProcessorUnit::new("inner");
        let result = {
            let inner = inner.clone();
            let probe = Task::new("nest", 0, move || inner.drain());
            unit.queue(probe);
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unit.drain()))
        };
        assert!(result.is_err());
        assert!(ProcessorUnit::current().is_none());
    }

    #[test]
    fn test_advance_clock_fires_timers_under_activation() {
        let unit = ProcessorUnit::new("timed");
        let saw_unit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&saw_unit);
        unit.scheduler()
            .schedule(50, move || flag.set(ProcessorUnit::current().is_some()))
            .unwrap();
        unit.advance_clock(50);
        assert!(saw_unit.get());
    }
}
