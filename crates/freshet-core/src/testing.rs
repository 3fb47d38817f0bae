//! Test instrumentation: a recording subscriber and its probe.
//!
//! [`TestSubscriber`] records every signal it receives; the paired
//! [`TestProbe`] reads the recording and can cancel the live subscription.
//! Used throughout this crate's tests and available to downstream crates
//! for the same purpose.
//!
//! ```rust
//! use freshet_core::source;
//! use freshet_core::testing::TestSubscriber;
//!
//! let (subscriber, probe) = TestSubscriber::new();
//! source::of(vec![1, 2, 3]).subscribe(subscriber);
//! assert_eq!(probe.items(), vec![1, 2, 3]);
//! assert!(probe.is_completed());
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::stream::{StreamError, Subscriber, Subscription};

struct ProbeState<T> {
    items: RefCell<Vec<T>>,
    completed: Cell<bool>,
    error: RefCell<Option<StreamError>>,
    subscription: RefCell<Option<Subscription>>,
    subscribe_calls: Cell<usize>,
    /// When set, the subscription is cancelled right after the Nth item is
    /// recorded.
    cancel_after: Cell<Option<usize>>,
}

/// A subscriber that records every signal for later inspection.
pub struct TestSubscriber<T> {
    state: Rc<ProbeState<T>>,
}

/// Read side of a [`TestSubscriber`].
pub struct TestProbe<T> {
    state: Rc<ProbeState<T>>,
}

impl<T> TestSubscriber<T> {
    /// Creates a recording subscriber and its probe.
    #[must_use]
    pub fn new() -> (TestSubscriber<T>, TestProbe<T>) {
        Self::with_cancel_after(None)
    }

    /// Creates a recording subscriber that cancels its subscription
    /// immediately after recording the `n`th item.
    #[must_use]
    pub fn cancelling_after(n: usize) -> (TestSubscriber<T>, TestProbe<T>) {
        Self::with_cancel_after(Some(n))
    }

    fn with_cancel_after(n: Option<usize>) -> (TestSubscriber<T>, TestProbe<T>) {
        let state = Rc::new(ProbeState {
            items: RefCell::new(Vec::new()),
            completed: Cell::new(false),
            error: RefCell::new(None),
            subscription: RefCell::new(None),
            subscribe_calls: Cell::new(0),
            cancel_after: Cell::new(n),
        });
        (
            TestSubscriber {
                state: Rc::clone(&state),
            },
            TestProbe { state },
        )
    }
}

impl<T> Subscriber<T> for TestSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.state
            .subscribe_calls
            .set(self.state.subscribe_calls.get() + 1);
        *self.state.subscription.borrow_mut() = Some(subscription);
    }

    fn on_item(&mut self, item: T) {
        self.state.items.borrow_mut().push(item);
        if let Some(n) = self.state.cancel_after.get() {
            if self.state.items.borrow().len() >= n {
                self.state.cancel_after.set(None);
                let subscription = self.state.subscription.borrow().clone();
                if let Some(subscription) = subscription {
                    subscription.cancel();
                }
            }
        }
    }

    fn on_error(&mut self, error: StreamError) {
        *self.state.error.borrow_mut() = Some(error);
    }

    fn on_complete(&mut self) {
        self.state.completed.set(true);
    }
}

impl<T> TestProbe<T> {
    /// Returns the recorded items.
    #[must_use]
    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.state.items.borrow().clone()
    }

    /// Returns the number of recorded items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.state.items.borrow().len()
    }

    /// Returns true once `on_complete` was recorded.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.completed.get()
    }

    /// Returns the recorded error, if any.
    #[must_use]
    pub fn error(&self) -> Option<StreamError> {
        self.state.error.borrow().clone()
    }

    /// Returns true once either terminal signal was recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_completed() || self.state.error.borrow().is_some()
    }

    /// Returns how many times `on_subscribe` was delivered.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.get()
    }

    /// Returns true while the subscription is live (received and not
    /// cancelled).
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state
            .subscription
            .borrow()
            .as_ref()
            .is_some_and(|s| !s.is_cancelled())
    }

    /// Cancels the live subscription.
    pub fn cancel(&self) {
        let subscription = self.state.subscription.borrow().clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_items_and_complete() {
        let (mut subscriber, probe) = TestSubscriber::new();
        subscriber.on_subscribe(Subscription::unattached());
        subscriber.on_item(1);
        subscriber.on_item(2);
        subscriber.on_complete();

        assert_eq!(probe.items(), vec![1, 2]);
        assert_eq!(probe.subscribe_calls(), 1);
        assert!(probe.is_completed());
        assert!(probe.error().is_none());
    }

    #[test]
    fn test_records_error() {
        let (mut subscriber, probe) = TestSubscriber::<i32>::new();
        subscriber.on_subscribe(Subscription::unattached());
        subscriber.on_error(StreamError::message("bad"));
        assert!(probe.is_terminated());
        assert_eq!(probe.error().unwrap().to_string(), "bad");
    }

    #[test]
    fn test_cancelling_after() {
        let (mut subscriber, probe) = TestSubscriber::cancelling_after(2);
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        subscriber.on_item(1);
        assert!(!subscription.is_cancelled());
        subscriber.on_item(2);
        assert!(subscription.is_cancelled());
        assert!(!probe.is_subscribed());
    }
}
