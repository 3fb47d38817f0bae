//! Rate-limiting operators: `throttle_latest`, `sample`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::scheduler::{Scheduler, TimerHandle};
use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct ThrottleShared<T> {
    downstream: RefCell<BoxSubscriber<T>>,
    latest: RefCell<Option<T>>,
    window_open: Cell<bool>,
    timer: RefCell<Option<TimerHandle>>,
    link: Rc<StageLink>,
    scheduler: Scheduler,
    period: u64,
}

impl<T: 'static> ThrottleShared<T> {
    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.borrow_mut().take() {
            timer.cancel();
        }
    }

    /// Opens a fresh throttle window ending `period` from now.
    fn open_window(self: &Rc<Self>) {
        let shared = Rc::clone(self);
        match self.scheduler.schedule(self.period, move || shared.on_window_end()) {
            Ok(handle) => {
                self.window_open.set(true);
                *self.timer.borrow_mut() = Some(handle);
            }
            Err(_) => {
                // Scheduler is gone; fall back to emitting every item.
                self.window_open.set(false);
            }
        }
    }

    fn on_window_end(self: &Rc<Self>) {
        if self.link.is_done() {
            return;
        }
        let latest = self.latest.borrow_mut().take();
        if let Some(item) = latest {
            self.downstream.borrow_mut().on_item(item);
            if !self.link.is_done() {
                self.open_window();
            }
        } else {
            self.window_open.set(false);
        }
    }
}

struct ThrottleWorker<T> {
    shared: Rc<ThrottleShared<T>>,
}

impl<T: 'static> Subscriber<T> for ThrottleWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);
        let shared = Rc::clone(&self.shared);
        let subscription = Subscription::new(move || {
            shared.cancel_timer();
            shared.link.cancel_upstream();
        });
        self.shared.downstream.borrow_mut().on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        if self.shared.window_open.get() {
            *self.shared.latest.borrow_mut() = Some(item);
        } else {
            self.shared.downstream.borrow_mut().on_item(item);
            if !self.shared.link.is_done() {
                self.shared.open_window();
            }
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.cancel_timer();
        self.shared.latest.borrow_mut().take();
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_error(error);
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.cancel_timer();
        let trailing = self.shared.latest.borrow_mut().take();
        if let Some(item) = trailing {
            self.shared.downstream.borrow_mut().on_item(item);
            if self.shared.link.is_done() {
                return;
            }
        }
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_complete();
    }
}

struct SampleShared<T> {
    downstream: RefCell<BoxSubscriber<T>>,
    latest: RefCell<Option<T>>,
    timer: RefCell<Option<TimerHandle>>,
    link: Rc<StageLink>,
}

struct SampleWorker<T> {
    shared: Rc<SampleShared<T>>,
    scheduler: Scheduler,
    period: u64,
}

impl<T: 'static> Subscriber<T> for SampleWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);

        let probe = Rc::clone(&self.shared);
        let sampler = self.scheduler.schedule_periodic(self.period, move || {
            if probe.link.is_done() {
                return;
            }
            let latest = probe.latest.borrow_mut().take();
            if let Some(item) = latest {
                probe.downstream.borrow_mut().on_item(item);
            }
        });
        if let Ok(handle) = sampler {
            *self.shared.timer.borrow_mut() = Some(handle);
        }

        let shared = Rc::clone(&self.shared);
        let subscription = Subscription::new(move || {
            if let Some(timer) = shared.timer.borrow_mut().take() {
                timer.cancel();
            }
            shared.link.cancel_upstream();
        });
        self.shared.downstream.borrow_mut().on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        *self.shared.latest.borrow_mut() = Some(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        if let Some(timer) = self.shared.timer.borrow_mut().take() {
            timer.cancel();
        }
        self.shared.latest.borrow_mut().take();
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_error(error);
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        if let Some(timer) = self.shared.timer.borrow_mut().take() {
            timer.cancel();
        }
        self.shared.latest.borrow_mut().take();
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_complete();
    }
}

impl<T: 'static> Stream<T> {
    /// Emits the first item immediately, then at most one item per
    /// `period`: the most recent one to arrive during the window. A
    /// trailing held item is flushed before completion.
    #[must_use]
    pub fn throttle_latest(self, scheduler: &Scheduler, period: u64) -> Stream<T> {
        let scheduler = scheduler.clone();
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(ThrottleWorker {
                shared: Rc::new(ThrottleShared {
                    downstream: RefCell::new(downstream),
                    latest: RefCell::new(None),
                    window_open: Cell::new(false),
                    timer: RefCell::new(None),
                    link: StageLink::new(),
                    scheduler: scheduler.clone(),
                    period,
                }),
            });
        })
    }

    /// Every `period`, emits the most recent item not yet seen downstream.
    /// Quiet periods emit nothing; a pending item is dropped on terminal.
    #[must_use]
    pub fn sample(self, scheduler: &Scheduler, period: u64) -> Stream<T> {
        let scheduler = scheduler.clone();
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(SampleWorker {
                shared: Rc::new(SampleShared {
                    downstream: RefCell::new(downstream),
                    latest: RefCell::new(None),
                    timer: RefCell::new(None),
                    link: StageLink::new(),
                }),
                scheduler: scheduler.clone(),
                period,
            });
        })
    }
}
