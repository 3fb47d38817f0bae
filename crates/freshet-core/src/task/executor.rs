//! Round-based task executor.
//!
//! The executor pulls tasks off the queue in *rounds*. At the start of a
//! round it records the queue length and runs exactly that many tasks, so
//! tasks enqueued during a round run in the next round. When the number of
//! consecutive non-empty rounds exceeds the round budget, runaway tasks are
//! detected: the executor raises a diagnostic naming the still-pending
//! tasks and, when configured, purges the queue.

use crate::config;

use super::{Task, TaskQueue};

/// Decision returned by [`RoundExecutor::poll`].
#[derive(Debug)]
pub enum ExecutorPoll {
    /// A task was dequeued; the caller must run it and hand it back via
    /// [`RoundExecutor::complete_task`].
    Run(Task),
    /// The queue is empty.
    Idle,
    /// The round budget was exceeded; the runaway policy has been applied.
    Runaway,
}

/// Executes queued tasks in rounds, detecting runaway re-enqueue loops.
pub struct RoundExecutor {
    queue: TaskQueue,
    /// Maximum number of rounds before runaway detection fires.
    max_rounds: u32,
    /// Whether runaway detection empties the queue.
    purge_on_runaway: bool,
    current_round: u32,
    remaining_in_round: usize,
}

impl RoundExecutor {
    /// Creates an executor over the given queue.
    #[must_use]
    pub fn new(queue: TaskQueue, max_rounds: u32, purge_on_runaway: bool) -> Self {
        assert!(max_rounds > 0, "max_rounds must be > 0");
        Self {
            queue,
            max_rounds,
            purge_on_runaway,
            current_round: 0,
            remaining_in_round: 0,
        }
    }

    /// Creates an executor configured from the process-wide [`Config`].
    ///
    /// [`Config`]: crate::config::Config
    #[must_use]
    pub fn from_config() -> Self {
        let config = config::get();
        Self::new(
            TaskQueue::new(config.priority_count, config.initial_queue_capacity),
            config.max_rounds,
            config.purge_on_runaway,
        )
    }

    /// Returns the round budget.
    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Returns true while a round is in progress.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.current_round != 0
    }

    /// Returns the task queue.
    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Returns the task queue mutably, for enqueueing.
    pub fn queue_mut(&mut self) -> &mut TaskQueue {
        &mut self.queue
    }

    /// Advances the round bookkeeping and dequeues the next runnable task.
    ///
    /// Disposed tasks popped from the queue are skipped. The returned task
    /// has already been marked executed so that its body may legally
    /// re-enqueue it; after running it the caller must call
    /// [`complete_task`](Self::complete_task).
    ///
    /// # Panics
    ///
    /// Panics under `check_invariants` when runaway tasks are detected.
    pub fn poll(&mut self) -> ExecutorPoll {
        loop {
            if self.remaining_in_round == 0 {
                let pending = self.queue.len();
                if pending == 0 {
                    self.current_round = 0;
                    return ExecutorPoll::Idle;
                }
                if self.current_round + 1 > self.max_rounds {
                    self.current_round = 0;
                    self.on_runaway_detected();
                    return ExecutorPoll::Runaway;
                }
                self.current_round += 1;
                self.remaining_in_round = pending;
            }

            self.remaining_in_round -= 1;
            let Some(task) = self.queue.dequeue() else {
                // Queue drained mid-round by a purge or clear.
                self.remaining_in_round = 0;
                continue;
            };
            if task.is_disposed() {
                continue;
            }
            task.mark_executed();
            return ExecutorPoll::Run(task);
        }
    }

    /// Finishes a task returned by [`poll`](Self::poll): periodic tasks
    /// that were not disposed or re-enqueued by their own body go back on
    /// the queue.
    pub fn complete_task(&mut self, task: &Task) {
        if task.is_periodic() && task.state() == super::TaskState::Idle {
            self.queue.enqueue(task.clone());
        }
    }

    /// Runs at most one task. Returns true when a task was run, false when
    /// the queue was idle or runaway tasks were detected.
    ///
    /// This is the self-contained loop used when task bodies do not need to
    /// reach back into this executor; [`ProcessorUnit`] drives the
    /// [`poll`](Self::poll)/[`complete_task`](Self::complete_task) pair
    /// instead.
    ///
    /// [`ProcessorUnit`]: crate::unit::ProcessorUnit
    pub fn run_one_task(&mut self) -> bool {
        match self.poll() {
            ExecutorPoll::Run(task) => {
                task.run();
                self.complete_task(&task);
                true
            }
            ExecutorPoll::Idle | ExecutorPoll::Runaway => false,
        }
    }

    /// Runs pending tasks until the queue is idle or runaway tasks are
    /// detected.
    pub fn run_pending_tasks(&mut self) {
        while self.run_one_task() {}
    }

    /// Applies the runaway policy: always raise a diagnostic naming the
    /// still-pending tasks; purge the queue when configured; fail under
    /// `check_invariants`.
    fn on_runaway_detected(&mut self) {
        let task_names = self.queue.ordered_task_names();
        tracing::error!(
            max_rounds = self.max_rounds,
            pending = task_names.len(),
            tasks = ?task_names,
            "runaway task(s) detected: tasks still queued after {} rounds",
            self.max_rounds
        );

        if self.purge_on_runaway {
            let purged = self.queue.clear();
            for task in &purged {
                task.mark_executed();
            }
        }

        if config::get().check_invariants {
            panic!(
                "Runaway task(s) detected. Tasks still running after {} rounds: {task_names:?}",
                self.max_rounds
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    use super::*;

    fn executor(max_rounds: u32, purge: bool) -> RoundExecutor {
        RoundExecutor::new(TaskQueue::new(3, 4), max_rounds, purge)
    }

    #[test]
    fn test_runs_queued_tasks_in_order() {
        let mut executor = executor(100, false);
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            executor
                .queue_mut()
                .enqueue(Task::new(name, 0, move || log.borrow_mut().push(name)));
        }
        executor.run_pending_tasks();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert!(!executor.is_executing());
    }

    #[test]
    fn test_poll_idle_on_empty_queue() {
        let mut executor = executor(100, false);
        assert!(matches!(executor.poll(), ExecutorPoll::Idle));
    }

    #[test]
    fn test_skips_disposed_tasks() {
        let mut executor = executor(100, false);
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let task = Task::new("doomed", 0, move || flag.set(true));
        executor.queue_mut().enqueue(task.clone());
        task.cancel();
        executor.run_pending_tasks();
        assert!(!ran.get());
    }

    #[test]
    fn test_task_enqueued_during_round_runs_next_round() {
        // Driving the poll/complete pair the way a processor unit does: a
        // task enqueued while round 1 is in flight runs in round 2.
        let mut executor = executor(2, false);
        let ran_second = Rc::new(Cell::new(false));
        let second_flag = Rc::clone(&ran_second);
        let second = Task::new("second", 0, move || second_flag.set(true));

        executor.queue_mut().enqueue(Task::new("first", 0, || {}));

        let ExecutorPoll::Run(first) = executor.poll() else {
            panic!("expected a runnable task");
        };
        assert!(executor.is_executing());
        first.run();
        executor.complete_task(&first);
        executor.queue_mut().enqueue(second);

        executor.run_pending_tasks();
        assert!(ran_second.get());
        assert!(!executor.is_executing());
    }

    #[test]
    fn test_periodic_task_is_reenqueued() {
        let mut executor = executor(100, false);
        let runs = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&runs);
        let task = Task::new_periodic("tick", 0, move || counter.set(counter.get() + 1));
        executor.queue_mut().enqueue(task.clone());

        assert!(executor.run_one_task());
        assert_eq!(runs.get(), 1);
        assert_eq!(executor.queue().len(), 1);

        assert!(executor.run_one_task());
        assert_eq!(runs.get(), 2);

        task.cancel();
        executor.run_pending_tasks();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_runaway_self_enqueueing_task() {
        // A task that re-enqueues itself runs once per round; with
        // max_rounds = 2 it runs exactly twice before the policy fires.
        let mut executor = executor(2, true);
        let runs = Rc::new(Cell::new(0u32));

        let counter = Rc::clone(&runs);
        let task = Task::new("greedy", 0, move || counter.set(counter.get() + 1));
        executor.queue_mut().enqueue(task.clone());

        let result = catch_unwind(AssertUnwindSafe(|| loop {
            match executor.poll() {
                ExecutorPoll::Run(task) => {
                    task.run();
                    executor.complete_task(&task);
                    executor.queue_mut().enqueue(task);
                }
                ExecutorPoll::Idle | ExecutorPoll::Runaway => break,
            }
        }));

        // check_invariants is on in debug builds, so detection panics after
        // the purge ran.
        assert!(result.is_err());
        assert_eq!(runs.get(), 2);
        assert!(executor.queue().is_empty());
    }
}
