//! The `debounce` operator.

use std::cell::RefCell;
use std::rc::Rc;

use crate::scheduler::{Scheduler, TimerHandle};
use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct DebounceShared<T> {
    downstream: RefCell<BoxSubscriber<T>>,
    pending: RefCell<Option<T>>,
    timer: RefCell<Option<TimerHandle>>,
    link: Rc<StageLink>,
}

impl<T> DebounceShared<T> {
    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.borrow_mut().take() {
            timer.cancel();
        }
    }

    fn flush_pending(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some(item) = pending {
            if !self.link.is_done() {
                self.downstream.borrow_mut().on_item(item);
            }
        }
    }
}

struct DebounceWorker<T, F: FnMut(&T) -> u64> {
    shared: Rc<DebounceShared<T>>,
    scheduler: Scheduler,
    delay_of: F,
}

impl<T: 'static, F: FnMut(&T) -> u64> Subscriber<T> for DebounceWorker<T, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);
        let link = Rc::clone(&self.shared.link);
        let shared = Rc::clone(&self.shared);
        let subscription = Subscription::new(move || {
            shared.cancel_timer();
            link.cancel_upstream();
        });
        self.shared.downstream.borrow_mut().on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.cancel_timer();
        let delay = (self.delay_of)(&item);
        *self.shared.pending.borrow_mut() = Some(item);

        let fire = Rc::clone(&self.shared);
        match self.scheduler.schedule(delay, move || fire.flush_pending()) {
            Ok(handle) => *self.shared.timer.borrow_mut() = Some(handle),
            Err(error) => {
                self.shared.pending.borrow_mut().take();
                self.shared.link.cancel_upstream();
                self.shared
                    .downstream
                    .borrow_mut()
                    .on_error(StreamError::new(error));
            }
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.cancel_timer();
        self.shared.pending.borrow_mut().take();
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_error(error);
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.cancel_timer();
        self.shared.flush_pending();
        if self.shared.link.is_done() {
            return;
        }
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_complete();
    }
}

impl<T: 'static> Stream<T> {
    /// Holds each item back for `delay_of(&item)` clock units; a newer item
    /// voids the held one. When the timer fires, the held item is emitted.
    /// A pending item is flushed before completion is forwarded.
    #[must_use]
    pub fn debounce<F>(self, scheduler: &Scheduler, delay_of: F) -> Stream<T>
    where
        F: FnMut(&T) -> u64 + Clone + 'static,
    {
        let scheduler = scheduler.clone();
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(DebounceWorker {
                shared: Rc::new(DebounceShared {
                    downstream: RefCell::new(downstream),
                    pending: RefCell::new(None),
                    timer: RefCell::new(None),
                    link: StageLink::new(),
                }),
                scheduler: scheduler.clone(),
                delay_of: delay_of.clone(),
            });
        })
    }

    /// Debounces with a fixed delay.
    #[must_use]
    pub fn debounce_fixed(self, scheduler: &Scheduler, delay: u64) -> Stream<T> {
        self.debounce(scheduler, move |_| delay)
    }
}
