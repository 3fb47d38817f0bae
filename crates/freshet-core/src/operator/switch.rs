//! Higher-order replacement: `switch_all` / `switch_map`.
//!
//! At most one inner stream is live; each outer item cancels the active
//! inner (if any) and subscribes the new one. The downstream completes once
//! the outer has completed and the final inner has completed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::stream::{BoxSubscriber, Stream, StreamError, Subscriber, Subscription};

struct SwitchShared<T: 'static> {
    downstream: RefCell<BoxSubscriber<T>>,
    /// Identity of the inner allowed to signal; stale inners are ignored.
    current_id: Cell<u64>,
    current: RefCell<Option<Subscription>>,
    inner_active: Cell<bool>,
    outer: RefCell<Option<Subscription>>,
    outer_done: Cell<bool>,
    done: Cell<bool>,
    next_id: Cell<u64>,
}

impl<T: 'static> SwitchShared<T> {
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

struct SwitchOuter<T: 'static> {
    shared: Rc<SwitchShared<T>>,
}

impl<T: 'static> Subscriber<Stream<T>> for SwitchOuter<T> {
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
        if self.shared.done.get() {
            return;
        }
        let replaced = self.shared.current.borrow_mut().take();
        if let Some(subscription) = replaced {
            subscription.cancel();
        }
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        self.shared.current_id.set(id);
        self.shared.inner_active.set(true);
        stream.subscribe(SwitchInner {
            shared: Rc::clone(&self.shared),
            id,
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

struct SwitchInner<T: 'static> {
    shared: Rc<SwitchShared<T>>,
    id: u64,
}

impl<T: 'static> SwitchInner<T> {
    fn is_stale(&self) -> bool {
        self.shared.done.get() || self.shared.current_id.get() != self.id
    }
}

impl<T: 'static> Subscriber<T> for SwitchInner<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.is_stale() {
            subscription.cancel();
            return;
        }
        *self.shared.current.borrow_mut() = Some(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.is_stale() {
            return;
        }
        self.shared.downstream.borrow_mut().on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.is_stale() {
            return;
        }
        self.shared.fail(error);
    }

    fn on_complete(&mut self) {
        if self.is_stale() {
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
    /// Mirrors the most recent inner stream, cancelling the previous one
    /// as each new inner arrives.
    #[must_use]
    pub fn switch_all(self) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(SwitchOuter {
                shared: Rc::new(SwitchShared {
                    downstream: RefCell::new(downstream),
                    current_id: Cell::new(0),
                    current: RefCell::new(None),
                    inner_active: Cell::new(false),
                    outer: RefCell::new(None),
                    outer_done: Cell::new(false),
                    done: Cell::new(false),
                    next_id: Cell::new(0),
                }),
            });
        })
    }
}

impl<T: 'static> Stream<T> {
    /// Maps each item to a stream and mirrors only the most recent one.
    #[must_use]
    pub fn switch_map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Stream<R> + Clone + 'static,
    {
        self.map(mapper).switch_all()
    }
}

#[cfg(test)]
mod tests {
    use crate::scheduler::Scheduler;
    use crate::source;
    use crate::stream::StreamError;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_switch_replaces_active_inner() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        // Outer items at t=50 and t=100; each starts a fresh counter that
        // ticks every 20.
        let sched = scheduler.clone();
        source::periodic(&scheduler, 50)
            .take(2)
            .switch_map(move |round| {
                source::periodic(&sched, 20).map(move |tick| (round, tick))
            })
            .subscribe(subscriber);

        // Round 0 starts at t=50: ticks at 70, 90 emit (0,0), (0,1).
        scheduler.advance_to(99);
        assert_eq!(probe.items(), vec![(0, 0), (0, 1)]);

        // Round 1 starts at t=100, cancelling round 0. Its ticks land at
        // 120, 140, ...
        scheduler.advance_to(145);
        assert_eq!(probe.items(), vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert!(!probe.is_terminated());
    }

    #[test]
    fn test_switch_completes_after_outer_and_inner() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        let sched = scheduler.clone();
        source::periodic(&scheduler, 50)
            .take(1)
            .switch_map(move |_| source::periodic(&sched, 10).take(2))
            .subscribe(subscriber);

        // Outer completes at t=50 with its only item; the inner is still
        // running, so no terminal yet.
        scheduler.advance_to(55);
        assert!(!probe.is_terminated());

        scheduler.advance_to(70);
        assert_eq!(probe.items(), vec![0, 1]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_switch_synchronous_inners() {
        let (subscriber, probe) = TestSubscriber::new();
        // Synchronous inners complete before the next outer item, so
        // every inner's items appear.
        source::of(vec![1, 2])
            .switch_map(|v| source::of(vec![v * 10, v * 10 + 1]))
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![10, 11, 20, 21]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_switch_inner_error_propagates() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::of(vec![1])
            .switch_map(|_| source::fail::<i32>(StreamError::message("inner failed")))
            .subscribe(subscriber);
        assert_eq!(probe.error().unwrap().to_string(), "inner failed");
    }

    #[test]
    fn test_switch_cancel_stops_both_levels() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        let sched = scheduler.clone();
        source::periodic(&scheduler, 50)
            .switch_map(move |_| source::periodic(&sched, 10))
            .subscribe(subscriber);

        scheduler.advance_to(70);
        assert_eq!(probe.items(), vec![0, 1]);
        probe.cancel();
        scheduler.advance_to(500);
        assert_eq!(probe.item_count(), 2);
    }
}
