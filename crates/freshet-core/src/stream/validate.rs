//! Subscription lifecycle validator.
//!
//! When `validate_subscriptions` is enabled, every subscriber handed to
//! `Stream::subscribe` is wrapped in a [`ValidatingSubscriber`] that
//! asserts the ordering contract before forwarding each signal: exactly one
//! `on_subscribe` first, no signals after a terminal, no second terminal,
//! and no signals after a cancel has been observed.

use super::{StreamError, Subscriber, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Initial,
    Subscribed,
    Done,
}

/// Asserts the subscription lifecycle protocol around an inner subscriber.
pub struct ValidatingSubscriber<S> {
    inner: S,
    state: LifecycleState,
    subscription: Option<Subscription>,
}

impl<S> ValidatingSubscriber<S> {
    /// Wraps `inner` in lifecycle assertions.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: LifecycleState::Initial,
            subscription: None,
        }
    }

    fn check_signal_allowed(&self, signal: &str) {
        assert!(
            self.state != LifecycleState::Initial,
            "protocol violation: {signal} delivered before on_subscribe"
        );
        assert!(
            self.state != LifecycleState::Done,
            "protocol violation: {signal} delivered after a terminal signal"
        );
        if let Some(subscription) = &self.subscription {
            assert!(
                !subscription.is_cancelled(),
                "protocol violation: {signal} delivered after cancel"
            );
        }
    }
}

impl<T, S: Subscriber<T>> Subscriber<T> for ValidatingSubscriber<S> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        assert!(
            self.state == LifecycleState::Initial,
            "protocol violation: on_subscribe delivered twice"
        );
        self.state = LifecycleState::Subscribed;
        self.subscription = Some(subscription.clone());
        self.inner.on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        self.check_signal_allowed("on_item");
        self.inner.on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        self.check_signal_allowed("on_error");
        self.state = LifecycleState::Done;
        self.inner.on_error(error);
    }

    fn on_complete(&mut self) {
        self.check_signal_allowed("on_complete");
        self.state = LifecycleState::Done;
        self.inner.on_complete();
    }
}
