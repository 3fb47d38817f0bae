//! Asynchronous boundary operators: `subscribe_on`, `observe_on`, `delay`.
//!
//! These are the only operators that hand control to the task system:
//! `subscribe_on` performs the upstream subscription inside a task on a
//! [`ProcessorUnit`]; `observe_on` re-delivers every signal via a task on
//! the target unit; `delay` shifts items and completion by a fixed amount
//! of scheduler time.

use std::cell::RefCell;
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};
use crate::task::Task;
use crate::unit::ProcessorUnit;

/// Pass-through worker whose downstream already received `on_subscribe`;
/// the upstream handle attaches silently.
struct DeferredTail<T> {
    downstream: BoxSubscriber<T>,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for DeferredTail<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        self.downstream.on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.link.is_done() {
            return;
        }
        self.link.mark_done();
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if self.link.is_done() {
            return;
        }
        self.link.mark_done();
        self.downstream.on_complete();
    }
}

struct ObserveOnShared<T> {
    downstream: RefCell<BoxSubscriber<T>>,
    link: Rc<StageLink>,
}

struct ObserveOnWorker<T> {
    shared: Rc<ObserveOnShared<T>>,
    unit: ProcessorUnit,
}

impl<T: 'static> Subscriber<T> for ObserveOnWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);
        let subscription = self.shared.link.subscription();
        self.shared.downstream.borrow_mut().on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        let shared = Rc::clone(&self.shared);
        let mut item = Some(item);
        self.unit.queue(Task::new("observe-on:item", 0, move || {
            if shared.link.is_done() {
                return;
            }
            if let Some(item) = item.take() {
                shared.downstream.borrow_mut().on_item(item);
            }
        }));
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        // The done flag is only raised once the terminal task actually
        // runs, so item tasks still queued ahead of it deliver first.
        let shared = Rc::clone(&self.shared);
        self.unit.queue(Task::new("observe-on:error", 0, move || {
            if shared.link.is_done() {
                return;
            }
            shared.link.mark_done();
            shared.downstream.borrow_mut().on_error(error.clone());
        }));
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        let shared = Rc::clone(&self.shared);
        self.unit.queue(Task::new("observe-on:complete", 0, move || {
            if shared.link.is_done() {
                return;
            }
            shared.link.mark_done();
            shared.downstream.borrow_mut().on_complete();
        }));
    }
}

struct DelayShared<T> {
    downstream: RefCell<BoxSubscriber<T>>,
    link: Rc<StageLink>,
}

struct DelayWorker<T> {
    shared: Rc<DelayShared<T>>,
    scheduler: Scheduler,
    delay: u64,
}

impl<T: 'static> Subscriber<T> for DelayWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);
        let subscription = self.shared.link.subscription();
        self.shared.downstream.borrow_mut().on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        let shared = Rc::clone(&self.shared);
        let mut item = Some(item);
        let scheduled = self.scheduler.schedule(self.delay, move || {
            if shared.link.is_done() {
                return;
            }
            if let Some(item) = item.take() {
                shared.downstream.borrow_mut().on_item(item);
            }
        });
        if scheduled.is_err() {
            self.shared.link.cancel_upstream();
            self.shared
                .downstream
                .borrow_mut()
                .on_error(StreamError::message("scheduler has been shut down"));
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        // Errors jump the queue: mark done so delayed items still in
        // flight are voided, then forward immediately.
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_error(error);
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        let shared = Rc::clone(&self.shared);
        let _ = self.scheduler.schedule(self.delay, move || {
            if shared.link.is_done() {
                return;
            }
            shared.link.mark_done();
            shared.downstream.borrow_mut().on_complete();
        });
    }
}

impl<T: 'static> Stream<T> {
    /// Performs the upstream subscription inside a task queued on `unit`.
    /// The downstream receives its `on_subscribe` immediately; items start
    /// flowing once the unit drains.
    #[must_use]
    pub fn subscribe_on(self, unit: &ProcessorUnit) -> Stream<T> {
        let unit = unit.clone();
        Stream::from_subscribe_fn(move |mut downstream| {
            let link = StageLink::new();
            downstream.on_subscribe(link.subscription());

            let upstream = self.clone();
            let task_link = Rc::clone(&link);
            let mut slot = Some((downstream, link));
            unit.queue(Task::new("subscribe-on", 0, move || {
                if task_link.is_done() {
                    return;
                }
                if let Some((downstream, link)) = slot.take() {
                    upstream.subscribe(DeferredTail { downstream, link });
                }
            }));
        })
    }

    /// Re-delivers every signal via a task queued on `unit`, moving the
    /// downstream's processing onto that unit.
    #[must_use]
    pub fn observe_on(self, unit: &ProcessorUnit) -> Stream<T> {
        let unit = unit.clone();
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(ObserveOnWorker {
                shared: Rc::new(ObserveOnShared {
                    downstream: RefCell::new(downstream),
                    link: StageLink::new(),
                }),
                unit: unit.clone(),
            });
        })
    }

    /// Shifts items and the completion `delay` clock units into the
    /// future. Errors pass immediately and void still-delayed items.
    #[must_use]
    pub fn delay(self, scheduler: &Scheduler, delay: u64) -> Stream<T> {
        let scheduler = scheduler.clone();
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(DelayWorker {
                shared: Rc::new(DelayShared {
                    downstream: RefCell::new(downstream),
                    link: StageLink::new(),
                }),
                scheduler: scheduler.clone(),
                delay,
            });
        })
    }
}
