//! The peek family: side-effect hooks around each lifecycle signal.
//!
//! Hooks observe signals without altering them. The *before* hooks run
//! ahead of forwarding the signal downstream, the *after* hooks right
//! behind it; `on_terminate` runs before either terminal signal is
//! forwarded. A hook closure is shared by all subscriptions of the
//! returned stream.

use std::cell::RefCell;
use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

type ItemHook<T> = Rc<RefCell<dyn FnMut(&T)>>;
type ErrorHook = Rc<RefCell<dyn FnMut(&StreamError)>>;
type SignalHook = Rc<RefCell<dyn FnMut()>>;

struct Hooks<T> {
    before_item: Option<ItemHook<T>>,
    before_error: Option<ErrorHook>,
    after_error: Option<ErrorHook>,
    before_complete: Option<SignalHook>,
    after_complete: Option<SignalHook>,
    on_terminate: Option<SignalHook>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            before_item: None,
            before_error: None,
            after_error: None,
            before_complete: None,
            after_complete: None,
            on_terminate: None,
        }
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            before_item: self.before_item.clone(),
            before_error: self.before_error.clone(),
            after_error: self.after_error.clone(),
            before_complete: self.before_complete.clone(),
            after_complete: self.after_complete.clone(),
            on_terminate: self.on_terminate.clone(),
        }
    }
}

struct PeekWorker<T> {
    downstream: BoxSubscriber<T>,
    hooks: Hooks<T>,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for PeekWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if let Some(hook) = &self.hooks.before_item {
            hook.borrow_mut()(&item);
        }
        if self.link.is_done() {
            return;
        }
        self.downstream.on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.link.is_done() {
            return;
        }
        if let Some(hook) = &self.hooks.on_terminate {
            hook.borrow_mut()();
        }
        if let Some(hook) = &self.hooks.before_error {
            hook.borrow_mut()(&error);
        }
        self.link.mark_done();
        self.downstream.on_error(error.clone());
        if let Some(hook) = &self.hooks.after_error {
            hook.borrow_mut()(&error);
        }
    }

    fn on_complete(&mut self) {
        if self.link.is_done() {
            return;
        }
        if let Some(hook) = &self.hooks.on_terminate {
            hook.borrow_mut()();
        }
        if let Some(hook) = &self.hooks.before_complete {
            hook.borrow_mut()();
        }
        self.link.mark_done();
        self.downstream.on_complete();
        if let Some(hook) = &self.hooks.after_complete {
            hook.borrow_mut()();
        }
    }
}

/// `after_item` needs the item again once forwarding has consumed it, so
/// it keeps a clone and gets its own worker with the `Clone` bound.
struct AfterItemWorker<T: Clone> {
    downstream: BoxSubscriber<T>,
    hook: ItemHook<T>,
    link: Rc<StageLink>,
}

impl<T: Clone> Subscriber<T> for AfterItemWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        let copy = item.clone();
        self.downstream.on_item(item);
        self.hook.borrow_mut()(&copy);
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

fn peek_stream<T: 'static>(upstream: Stream<T>, hooks: Hooks<T>) -> Stream<T> {
    Stream::from_subscribe_fn(move |downstream| {
        upstream.subscribe(PeekWorker {
            downstream,
            hooks: hooks.clone(),
            link: StageLink::new(),
        });
    })
}

impl<T: 'static> Stream<T> {
    /// Invokes `hook` with each item before forwarding it.
    #[must_use]
    pub fn peek(self, hook: impl FnMut(&T) + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                before_item: Some(Rc::new(RefCell::new(hook)) as ItemHook<T>),
                ..Hooks::default()
            },
        )
    }

    /// Invokes `hook` with the error before forwarding it.
    #[must_use]
    pub fn peek_error(self, hook: impl FnMut(&StreamError) + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                before_error: Some(Rc::new(RefCell::new(hook)) as ErrorHook),
                ..Hooks::default()
            },
        )
    }

    /// Invokes `hook` with the error right after forwarding it.
    #[must_use]
    pub fn after_error(self, hook: impl FnMut(&StreamError) + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                after_error: Some(Rc::new(RefCell::new(hook)) as ErrorHook),
                ..Hooks::default()
            },
        )
    }

    /// Invokes `hook` before forwarding the completion.
    #[must_use]
    pub fn peek_complete(self, hook: impl FnMut() + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                before_complete: Some(Rc::new(RefCell::new(hook)) as SignalHook),
                ..Hooks::default()
            },
        )
    }

    /// Invokes `hook` right after forwarding the completion.
    #[must_use]
    pub fn after_complete(self, hook: impl FnMut() + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                after_complete: Some(Rc::new(RefCell::new(hook)) as SignalHook),
                ..Hooks::default()
            },
        )
    }

    /// Invokes `hook` once, before either terminal signal is forwarded.
    #[must_use]
    pub fn on_terminate(self, hook: impl FnMut() + 'static) -> Stream<T> {
        peek_stream(
            self,
            Hooks {
                on_terminate: Some(Rc::new(RefCell::new(hook)) as SignalHook),
                ..Hooks::default()
            },
        )
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Invokes `hook` with each item right after forwarding it.
    #[must_use]
    pub fn after_item(self, hook: impl FnMut(&T) + 'static) -> Stream<T> {
        let hook = Rc::new(RefCell::new(hook)) as ItemHook<T>;
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(AfterItemWorker {
                downstream,
                hook: Rc::clone(&hook),
                link: StageLink::new(),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::source;
    use crate::stream::StreamError;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_peek_observes_without_altering() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2, 3])
            .peek(move |v: &i32| log.borrow_mut().push(*v))
            .subscribe(subscriber);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(probe.items(), vec![1, 2, 3]);
    }

    #[test]
    fn test_peek_around_take_sees_only_taken_items() {
        // range(42, 20).peek(P1).take(5).peek(P2): both peeks run 5 times
        // with 42..=46; downstream gets the items and a completion.
        let p1 = Rc::new(RefCell::new(Vec::new()));
        let p2 = Rc::new(RefCell::new(Vec::new()));
        let p1_log = Rc::clone(&p1);
        let p2_log = Rc::clone(&p2);

        let (subscriber, probe) = TestSubscriber::new();
        source::range(42, 20)
            .peek(move |v: &i64| p1_log.borrow_mut().push(*v))
            .take(5)
            .peek(move |v: &i64| p2_log.borrow_mut().push(*v))
            .subscribe(subscriber);

        assert_eq!(*p1.borrow(), vec![42, 43, 44, 45, 46]);
        assert_eq!(*p2.borrow(), vec![42, 43, 44, 45, 46]);
        assert_eq!(probe.items(), vec![42, 43, 44, 45, 46]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_after_item_runs_behind_forwarding() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let hook_log = Rc::clone(&order);
        let downstream_log = Rc::clone(&order);
        let (subscriber, _probe) = TestSubscriber::new();
        source::of(vec![1])
            .after_item(move |v: &i32| hook_log.borrow_mut().push(format!("after {v}")))
            .peek(move |v: &i32| downstream_log.borrow_mut().push(format!("downstream {v}")))
            .subscribe(subscriber);
        assert_eq!(*order.borrow(), vec!["downstream 1", "after 1"]);
    }

    #[test]
    fn test_error_hooks_fire_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let before = Rc::clone(&order);
        let after = Rc::clone(&order);
        let terminate = Rc::clone(&order);

        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::fail::<i32>(StreamError::message("x"))
            .on_terminate(move || terminate.borrow_mut().push("terminate"))
            .peek_error(move |_| before.borrow_mut().push("before"))
            .after_error(move |_| after.borrow_mut().push("after"))
            .subscribe(subscriber);

        assert!(probe.error().is_some());
        assert_eq!(*order.borrow(), vec!["terminate", "before", "after"]);
    }

    #[test]
    fn test_complete_hooks() {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::empty::<i32>()
            .peek_complete(move || counter.set(counter.get() + 1))
            .subscribe(subscriber);
        assert!(probe.is_completed());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_on_terminate_fires_for_complete_too() {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let (subscriber, _probe) = TestSubscriber::new();
        source::of(vec![1])
            .on_terminate(move || counter.set(counter.get() + 1))
            .subscribe(subscriber);
        assert_eq!(count.get(), 1);
    }
}
