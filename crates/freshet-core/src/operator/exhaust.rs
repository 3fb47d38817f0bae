//! Higher-order dropping: `exhaust_all` / `exhaust_map`.
//!
//! The mirror of `switch`: while an inner stream is live, outer items are
//! dropped. When the active inner completes, the next outer item becomes
//! eligible to start a new inner.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::stream::{BoxSubscriber, Stream, StreamError, Subscriber, Subscription};

struct ExhaustShared<T: 'static> {
    downstream: RefCell<BoxSubscriber<T>>,
    current: RefCell<Option<Subscription>>,
    inner_active: Cell<bool>,
    outer: RefCell<Option<Subscription>>,
    outer_done: Cell<bool>,
    done: Cell<bool>,
}

impl<T: 'static> ExhaustShared<T> {
    fn cancel_all(&self) {
        let outer = self.outer.borrow_mut().take();
        if let Some(subscription) = outer {
            subscription.cancel();
        }
        let current = self.current.borrow_mut().take();
        if let Some(subscription) = current {
            subscription.cancel();
        }
        self.inner_active.set(false);
    }

    fn fail(&self, error: StreamError) {
        self.done.set(true);
        self.cancel_all();
        self.downstream.borrow_mut().on_error(error);
    }
}

struct ExhaustOuter<T: 'static> {
    shared: Rc<ExhaustShared<T>>,
}

impl<T: 'static> Subscriber<Stream<T>> for ExhaustOuter<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.shared.done.get() {
            subscription.cancel();
            return;
        }
        *self.shared.outer.borrow_mut() = Some(subscription);
        let shared = Rc::clone(&self.shared);
        self.shared
            .downstream
            .borrow_mut()
            .on_subscribe(Subscription::new(move || {
                shared.done.set(true);
                shared.cancel_all();
            }));
    }

    fn on_item(&mut self, stream: Stream<T>) {
        if self.shared.done.get() || self.shared.inner_active.get() {
            return;
        }
        self.shared.inner_active.set(true);
        stream.subscribe(ExhaustInner {
            shared: Rc::clone(&self.shared),
        });
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.done.get() {
            return;
        }
        self.shared.fail(error);
    }

    fn on_complete(&mut self) {
        if self.shared.done.get() {
            return;
        }
        self.shared.outer_done.set(true);
        self.shared.outer.borrow_mut().take();
        if !self.shared.inner_active.get() {
            self.shared.done.set(true);
            self.shared.downstream.borrow_mut().on_complete();
        }
    }
}

struct ExhaustInner<T: 'static> {
    shared: Rc<ExhaustShared<T>>,
}

impl<T: 'static> Subscriber<T> for ExhaustInner<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.shared.done.get() {
            subscription.cancel();
            return;
        }
        *self.shared.current.borrow_mut() = Some(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.shared.done.get() {
            return;
        }
        self.shared.downstream.borrow_mut().on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.done.get() {
            return;
        }
        self.shared.fail(error);
    }

    fn on_complete(&mut self) {
        if self.shared.done.get() {
            return;
        }
        self.shared.current.borrow_mut().take();
        self.shared.inner_active.set(false);
        if self.shared.outer_done.get() {
            self.shared.done.set(true);
            self.shared.downstream.borrow_mut().on_complete();
        }
    }
}

impl<T: 'static> Stream<Stream<T>> {
    /// Mirrors the first inner stream to arrive and drops outer items
    /// while it is live; each completion re-opens the door for the next
    /// outer item.
    #[must_use]
    pub fn exhaust_all(self) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(ExhaustOuter {
                shared: Rc::new(ExhaustShared {
                    downstream: RefCell::new(downstream),
                    current: RefCell::new(None),
                    inner_active: Cell::new(false),
                    outer: RefCell::new(None),
                    outer_done: Cell::new(false),
                    done: Cell::new(false),
                }),
            });
        })
    }
}

impl<T: 'static> Stream<T> {
    /// Maps each item to a stream, ignoring items that arrive while a
    /// mapped stream is still live.
    #[must_use]
    pub fn exhaust_map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Stream<R> + Clone + 'static,
    {
        self.map(mapper).exhaust_all()
    }
}

#[cfg(test)]
mod tests {
    use crate::scheduler::Scheduler;
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_exhaust_drops_items_while_inner_live() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        let sched = scheduler.clone();
        // Outer items every 30; each inner runs 50 (ticks at 20 and 40
        // after start, then completes). Outer items landing inside that
        // span are dropped.
        source::periodic(&scheduler, 30)
            .take(4)
            .exhaust_map(move |round| {
                source::periodic(&sched, 20).take(2).map(move |tick| (round, tick))
            })
            .subscribe(subscriber);

        // Round 0 starts at t=30, ticks at 50 and 70, completes at 70.
        // The outer item at t=60 is dropped; the one at t=90 starts
        // round 2.
        scheduler.advance_to(70);
        assert_eq!(probe.items(), vec![(0, 0), (0, 1)]);

        scheduler.advance_to(130);
        assert_eq!(probe.items(), vec![(0, 0), (0, 1), (2, 0), (2, 1)]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_exhaust_synchronous_inners_all_run() {
        let (subscriber, probe) = TestSubscriber::new();
        // Each synchronous inner completes before the next outer item
        // arrives, so nothing is dropped.
        source::of(vec![1, 2])
            .exhaust_map(|v| source::of(vec![v * 10]))
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![10, 20]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_exhaust_completes_with_outer_when_idle() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::empty::<crate::stream::Stream<i32>>()
            .exhaust_all()
            .subscribe(subscriber);
        assert!(probe.is_completed());
    }
}
