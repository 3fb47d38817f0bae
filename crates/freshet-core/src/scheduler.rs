//! # Scheduler
//!
//! A virtual monotonic clock with delayed and periodic timers.
//!
//! The scheduler is the engine's only asynchronous boundary: operators that
//! need time (`debounce`, `throttle_latest`, `sample`, `delay`, the
//! `periodic` source) arm timers here, and the host advances the clock with
//! [`Scheduler::advance_by`] / [`Scheduler::advance_to`].
//!
//! The clock is an opaque monotonically non-decreasing `u64`. The unit is
//! implementation-defined — it is *intended* to be milliseconds but carries
//! no relationship to wall-clock time; delays and periods use the same
//! unit.
//!
//! ## Semantics
//!
//! - A delayed timer fires at `now() + delay`. Firing may drift forward
//!   (the clock is advanced past the deadline) but never fires early.
//! - A periodic timer with period `p >= 1` re-fires at `last_fire + p`;
//!   period 0 means one-shot.
//! - Timers due at the same instant fire in arming order.
//! - [`Scheduler::shutdown`] cancels timers that have not fired and rejects
//!   new work; a callback already being executed runs to completion.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// Errors from scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no new timers.
    #[error("scheduler has been shut down")]
    ShutDown,
}

/// Cancellation handle for a scheduled timer.
///
/// Cancellation is idempotent and synchronous: once `cancel` returns, the
/// timer's callback will not be invoked again. A callback that has already
/// been popped from the wheel cannot be un-run.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    /// Cancels the timer. Subsequent calls are no-ops.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Returns true once the timer has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

struct TimerEntry {
    fire_at: u64,
    /// Arming sequence; breaks ties so same-instant timers fire in order.
    seq: u64,
    /// Re-fire period; 0 means one-shot.
    period: u64,
    cancelled: Rc<Cell<bool>>,
    body: Rc<RefCell<dyn FnMut()>>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest first).
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct SchedulerState {
    now: u64,
    next_seq: u64,
    timers: BinaryHeap<TimerEntry>,
    shut_down: bool,
}

/// A shared handle to a scheduler. Clones refer to the same clock and
/// timer wheel.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    /// Creates a scheduler with its clock at 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                now: 0,
                next_seq: 0,
                timers: BinaryHeap::new(),
                shut_down: false,
            })),
        }
    }

    /// Returns the scheduler's current time.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Returns the number of armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state.borrow().shut_down
    }

    /// Arms a one-shot timer firing at `now() + delay`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn schedule(
        &self,
        delay: u64,
        body: impl FnMut() + 'static,
    ) -> Result<TimerHandle, SchedulerError> {
        self.arm(delay, 0, body)
    }

    /// Arms a periodic timer first firing at `now() + period` and re-firing
    /// every `period` after that. A period of 0 arms a one-shot timer that
    /// fires on the next clock advance.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn schedule_periodic(
        &self,
        period: u64,
        body: impl FnMut() + 'static,
    ) -> Result<TimerHandle, SchedulerError> {
        self.arm(period, period, body)
    }

    fn arm(
        &self,
        delay: u64,
        period: u64,
        body: impl FnMut() + 'static,
    ) -> Result<TimerHandle, SchedulerError> {
        let mut state = self.state.borrow_mut();
        if state.shut_down {
            return Err(SchedulerError::ShutDown);
        }
        let cancelled = Rc::new(Cell::new(false));
        let seq = state.next_seq;
        state.next_seq += 1;
        let fire_at = state.now.saturating_add(delay);
        state.timers.push(TimerEntry {
            fire_at,
            seq,
            period,
            cancelled: Rc::clone(&cancelled),
            body: Rc::new(RefCell::new(body)),
        });
        Ok(TimerHandle { cancelled })
    }

    /// Advances the clock by `delta`, firing due timers in order.
    pub fn advance_by(&self, delta: u64) {
        let target = self.now().saturating_add(delta);
        self.advance_to(target);
    }

    /// Advances the clock to `target`, firing every timer due at or before
    /// it in (fire time, arming order). Timers armed by a firing callback
    /// are themselves eligible within the same advance. A `target` in the
    /// past is ignored; the clock never moves backwards.
    pub fn advance_to(&self, target: u64) {
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                match state.timers.peek() {
                    Some(entry) if entry.fire_at <= target => {
                        let entry = state.timers.pop().expect("peeked entry");
                        state.now = state.now.max(entry.fire_at);
                        Some(entry)
                    }
                    _ => None,
                }
            };

            let Some(entry) = due else {
                break;
            };
            if entry.cancelled.get() {
                continue;
            }

            // The callback runs without any borrow of the scheduler state
            // held, so it may arm or cancel timers freely.
            (entry.body.borrow_mut())();

            if entry.period > 0 && !entry.cancelled.get() {
                let mut state = self.state.borrow_mut();
                if !state.shut_down {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.timers.push(TimerEntry {
                        fire_at: entry.fire_at.saturating_add(entry.period),
                        seq,
                        period: entry.period,
                        cancelled: entry.cancelled,
                        body: entry.body,
                    });
                }
            }
        }

        let mut state = self.state.borrow_mut();
        state.now = state.now.max(target);
    }

    /// Initiates an orderly shutdown: timers that have not fired are
    /// cancelled and discarded, and new timers are rejected.
    pub fn shutdown(&self) {
        let mut state = self.state.borrow_mut();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        let discarded = state.timers.len();
        for entry in state.timers.drain() {
            entry.cancelled.set(true);
        }
        if discarded > 0 {
            tracing::debug!(discarded, "scheduler shutdown discarded unfired timers");
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("pending_timers", &state.timers.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}
