//! # Streams and the Subscription Protocol
//!
//! A [`Stream`] is a *description* of how to produce items — pure until
//! subscribed, cheaply cloneable, subscribable any number of times. A
//! [`Subscriber`] consumes the four lifecycle signals; a [`Subscription`]
//! is the downstream-owned cancel capability.
//!
//! ## Protocol
//!
//! Every subscription obeys the same contract:
//!
//! - `on_subscribe` is delivered exactly once, strictly before any other
//!   signal.
//! - 0 or more `on_item` calls follow.
//! - At most one of `on_error` / `on_complete` terminates the sequence;
//!   never both.
//! - After a terminal signal, or after `cancel` returns, no further signal
//!   is delivered.
//!
//! Cancellation is idempotent and propagates upstream through the
//! subscription chain. A cancel issued during item delivery is honored no
//! later than the next item boundary.
//!
//! Operators that swap upstreams (`on_error_resume_with`, `switch_map`,
//! `concat_map`) present a *single* logical sequence downstream: one
//! `on_subscribe`, a seamless item stream, and only the final upstream's
//! terminal.

mod validate;

pub use validate::ValidatingSubscriber;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config;

// ---------------------------------------------------------------------------
// StreamError
// ---------------------------------------------------------------------------

/// The error payload of a stream's terminal error signal.
///
/// Unlike [`crate::Error`], which reports misuse of engine APIs, a
/// `StreamError` is *data*: it travels downstream as a signal, may be
/// latched by hubs and replayed to late subscribers, and so is cheaply
/// cloneable.
#[derive(Clone)]
pub struct StreamError {
    inner: Rc<dyn std::error::Error>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

impl StreamError {
    /// Wraps any error value.
    #[must_use]
    pub fn new(error: impl std::error::Error + 'static) -> Self {
        Self {
            inner: Rc::new(error),
        }
    }

    /// Creates an error carrying just a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn as_inner(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.as_ref()
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::fmt::Debug for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StreamError({})", self.inner)
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// A consumer of the four lifecycle signals.
pub trait Subscriber<T> {
    /// Called exactly once, before any other signal, handing over the
    /// cancel capability.
    fn on_subscribe(&mut self, subscription: Subscription);

    /// Called for each item.
    fn on_item(&mut self, item: T);

    /// Terminal: the sequence failed. Mutually exclusive with
    /// [`on_complete`](Self::on_complete).
    fn on_error(&mut self, error: StreamError);

    /// Terminal: the sequence finished. Mutually exclusive with
    /// [`on_error`](Self::on_error).
    fn on_complete(&mut self);
}

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        (**self).on_subscribe(subscription);
    }

    fn on_item(&mut self, item: T) {
        (**self).on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        (**self).on_error(error);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }
}

/// A boxed subscriber, the form operators pass between stages.
pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

struct SubscriptionState {
    cancelled: Cell<bool>,
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// The cancel capability handed to a subscriber in `on_subscribe`.
///
/// Cancellation is idempotent: the registered cancel action runs on the
/// first `cancel` call only. Clones share state.
#[derive(Clone)]
pub struct Subscription {
    state: Rc<SubscriptionState>,
}

impl Subscription {
    /// Creates a subscription that runs `on_cancel` once when cancelled.
    #[must_use]
    pub fn new(on_cancel: impl FnOnce() + 'static) -> Self {
        Self {
            state: Rc::new(SubscriptionState {
                cancelled: Cell::new(false),
                action: RefCell::new(Some(Box::new(on_cancel))),
            }),
        }
    }

    /// Creates a subscription with no cancel action. Sources that emit in a
    /// loop poll [`is_cancelled`](Self::is_cancelled) instead.
    #[must_use]
    pub fn unattached() -> Self {
        Self {
            state: Rc::new(SubscriptionState {
                cancelled: Cell::new(false),
                action: RefCell::new(None),
            }),
        }
    }

    /// Cancels the subscription. The first call runs the registered cancel
    /// action; subsequent calls are no-ops.
    pub fn cancel(&self) {
        if self.state.cancelled.replace(true) {
            return;
        }
        if let Some(action) = self.state.action.borrow_mut().take() {
            action();
        }
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StageLink
// ---------------------------------------------------------------------------

/// The shared per-stage state record composed into every pass-through
/// operator subscription: a done flag plus the upstream cancel handle.
///
/// The operator's worker subscriber and the [`Subscription`] it hands
/// downstream share one link, so a downstream cancel marks the stage done
/// (halting in-flight delivery at the next item boundary) and propagates
/// upstream.
pub(crate) struct StageLink {
    done: Cell<bool>,
    upstream: RefCell<Option<Subscription>>,
}

impl StageLink {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            done: Cell::new(false),
            upstream: RefCell::new(None),
        })
    }

    /// True once the stage saw a terminal signal or a cancel.
    pub(crate) fn is_done(&self) -> bool {
        self.done.get()
    }

    /// Marks the stage done without touching upstream (terminal signal
    /// received *from* upstream).
    pub(crate) fn mark_done(&self) {
        self.done.set(true);
    }

    /// Stores the upstream cancel handle. If the stage is already done the
    /// handle is cancelled immediately.
    pub(crate) fn set_upstream(&self, subscription: Subscription) {
        if self.done.get() {
            subscription.cancel();
        } else {
            *self.upstream.borrow_mut() = Some(subscription);
        }
    }

    /// Marks the stage done and cancels upstream, if attached.
    pub(crate) fn cancel_upstream(&self) {
        self.done.set(true);
        let upstream = self.upstream.borrow_mut().take();
        if let Some(subscription) = upstream {
            subscription.cancel();
        }
    }

    /// Builds the downstream-facing [`Subscription`] for this stage.
    pub(crate) fn subscription(self: &Rc<Self>) -> Subscription {
        let link = Rc::clone(self);
        Subscription::new(move || link.cancel_upstream())
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// A lazy description of a sequence of items terminated by a completion or
/// an error signal.
///
/// Streams are cheap to clone and may be subscribed any number of times;
/// each subscription is independent except through hubs.
pub struct Stream<T: 'static> {
    /// Debug name, recorded only when `names_enabled`.
    name: Option<Rc<str>>,
    subscribe_fn: Rc<dyn Fn(BoxSubscriber<T>)>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            subscribe_fn: Rc::clone(&self.subscribe_fn),
        }
    }
}

impl<T> Stream<T> {
    /// Builds a stream from a raw subscribe function.
    ///
    /// The function is invoked once per subscription and must uphold the
    /// protocol of the [module docs](self): deliver `on_subscribe` first,
    /// then items, then at most one terminal, and respect cancellation.
    #[must_use]
    pub fn from_subscribe_fn(subscribe_fn: impl Fn(BoxSubscriber<T>) + 'static) -> Self {
        Self {
            name: None,
            subscribe_fn: Rc::new(subscribe_fn),
        }
    }

    /// Attaches a debug name (recorded only when names are enabled).
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        if config::get().names_enabled {
            self.name = Some(Rc::from(name));
        }
        self
    }

    /// Returns the debug name, when set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Subscribes `subscriber` to this stream.
    ///
    /// When `validate_subscriptions` is enabled the subscriber is wrapped
    /// in a [`ValidatingSubscriber`] that asserts the lifecycle protocol.
    pub fn subscribe(&self, subscriber: impl Subscriber<T> + 'static) {
        if config::get().validate_subscriptions {
            (self.subscribe_fn)(Box::new(ValidatingSubscriber::new(subscriber)));
        } else {
            (self.subscribe_fn)(Box::new(subscriber));
        }
    }

    /// Subscribes with an item callback and the default terminal handling:
    /// completion is ignored, an error panics.
    pub fn for_each(&self, on_item: impl FnMut(T) + 'static) {
        struct ForEach<F> {
            on_item: F,
        }
        impl<T, F: FnMut(T)> Subscriber<T> for ForEach<F> {
            fn on_subscribe(&mut self, _subscription: Subscription) {}

            fn on_item(&mut self, item: T) {
                (self.on_item)(item);
            }

            fn on_error(&mut self, error: StreamError) {
                panic!("unhandled stream error: {error}");
            }

            fn on_complete(&mut self) {}
        }
        self.subscribe(ForEach { on_item });
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("name", &self.name()).finish()
    }
}
