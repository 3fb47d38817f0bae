//! # Multicast Hubs
//!
//! A [`Hub`] fans items out to an ordered list of downstream subscribers
//! and latches its terminal signal. Four variants cover the standard
//! multicast shapes:
//!
//! | Constructor | Late subscriber receives |
//! |-------------|--------------------------|
//! | [`Hub::subject`] | only future items (plus a latched terminal) |
//! | [`Hub::replay`] | the last `n` items, then future items |
//! | [`Hub::behavior`] | the current value, then future items |
//! | [`Hub::async_last`] | the final item, delivered only on completion |
//!
//! ## Broadcast policy
//!
//! Each broadcast iterates a snapshot of the subscriber list taken at its
//! start: subscribers added during a broadcast see items only from the
//! next item onward, while removals take effect immediately. Item payloads
//! are cloned per subscriber, which is why `Hub` requires `T: Clone`.
//!
//! A hub may be fed from any number of upstream streams (see
//! [`Connectable`]); the first terminal signal wins, is latched, and
//! cancels the remaining upstream subscriptions.

mod connectable;

pub use connectable::{Connectable, HubError};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::buffer::CircularBuffer;
use crate::config;
use crate::stream::{BoxSubscriber, Stream, StreamError, Subscriber, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HubMode {
    Subject,
    Replay,
    AsyncLast,
}

#[derive(Clone)]
enum Terminal {
    Complete,
    Error(StreamError),
}

struct DownstreamSlot<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    subscriber: Rc<RefCell<BoxSubscriber<T>>>,
}

type Snapshot<T> = SmallVec<[(Rc<Cell<bool>>, Rc<RefCell<BoxSubscriber<T>>>); 4]>;

struct HubInner<T: Clone + 'static> {
    mode: HubMode,
    /// Replay cache; capacity 0 disables caching (plain subject).
    cache_capacity: usize,
    cache: RefCell<CircularBuffer<T>>,
    terminal: RefCell<Option<Terminal>>,
    downstream: RefCell<Vec<DownstreamSlot<T>>>,
    upstream: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

/// A multicast fan-out with variant-specific caching and terminal
/// latching. Cheap shared handle; clones refer to the same hub.
pub struct Hub<T: Clone + 'static> {
    inner: Rc<HubInner<T>>,
}

impl<T: Clone + 'static> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Hub<T> {
    fn with_mode(mode: HubMode, cache_capacity: usize) -> Self {
        Self {
            inner: Rc::new(HubInner {
                mode,
                cache_capacity,
                cache: RefCell::new(CircularBuffer::new(cache_capacity.max(1))),
                terminal: RefCell::new(None),
                downstream: RefCell::new(Vec::new()),
                upstream: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// A plain subject: items broadcast as-is, nothing cached.
    #[must_use]
    pub fn subject() -> Self {
        Self::with_mode(HubMode::Subject, 0)
    }

    /// A replaying hub: late subscribers first receive the last
    /// `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn replay(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self::with_mode(HubMode::Replay, capacity)
    }

    /// A behavior hub: `replay(1)` initialized with `seed`.
    #[must_use]
    pub fn behavior(seed: T) -> Self {
        let hub = Self::with_mode(HubMode::Replay, 1);
        hub.inner.cache.borrow_mut().add(seed);
        hub
    }

    /// An async-last hub: holds only the most recent item and emits it
    /// exclusively when the hub completes.
    #[must_use]
    pub fn async_last() -> Self {
        Self::with_mode(HubMode::AsyncLast, 1)
    }

    /// Returns true once a terminal signal has been latched.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.terminal.borrow().is_some()
    }

    /// Returns true while at least one downstream subscriber is
    /// registered.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.inner.downstream.borrow().is_empty()
    }

    /// Returns the number of registered downstream subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.downstream.borrow().len()
    }

    /// Emits an item into the hub.
    ///
    /// After a terminal signal the item is dropped with a warning.
    pub fn next(&self, item: T) {
        if self.is_terminated() {
            self.report_violation("item emitted into a terminated hub");
            return;
        }
        match self.inner.mode {
            HubMode::Subject => self.broadcast_item(&item),
            HubMode::Replay => {
                self.cache_item(item.clone());
                self.broadcast_item(&item);
            }
            HubMode::AsyncLast => self.cache_item(item),
        }
    }

    /// Signals the terminal error, latching it for late subscribers and
    /// cancelling any upstream subscriptions.
    pub fn error(&self, error: StreamError) {
        if self.is_terminated() {
            self.report_violation("error signalled on a terminated hub");
            return;
        }
        *self.inner.terminal.borrow_mut() = Some(Terminal::Error(error.clone()));
        self.cancel_upstreams();
        for (active, subscriber) in self.snapshot() {
            if !active.get() {
                continue;
            }
            active.set(false);
            self.deliver(&subscriber, |s| s.on_error(error.clone()));
        }
        self.inner.downstream.borrow_mut().clear();
    }

    /// Signals completion. An async-last hub first broadcasts its held
    /// item.
    pub fn complete(&self) {
        if self.is_terminated() {
            self.report_violation("completion signalled on a terminated hub");
            return;
        }
        *self.inner.terminal.borrow_mut() = Some(Terminal::Complete);
        self.cancel_upstreams();
        let last = match self.inner.mode {
            HubMode::AsyncLast => self.inner.cache.borrow().peek().cloned(),
            _ => None,
        };
        for (active, subscriber) in self.snapshot() {
            if !active.get() {
                continue;
            }
            active.set(false);
            if let Some(item) = &last {
                self.deliver(&subscriber, |s| s.on_item(item.clone()));
            }
            self.deliver(&subscriber, |s| s.on_complete());
        }
        self.inner.downstream.borrow_mut().clear();
    }

    /// Returns a stream view of the hub for downstream subscription.
    #[must_use]
    pub fn stream(&self) -> Stream<T> {
        let hub = self.clone();
        Stream::from_subscribe_fn(move |subscriber| hub.register(subscriber))
    }

    /// Returns a subscriber that forwards every signal into the hub,
    /// capturing its upstream subscription in `capture` once subscribed.
    pub(crate) fn forwarder(
        &self,
        capture: Rc<RefCell<Option<Subscription>>>,
    ) -> impl Subscriber<T> {
        ForwardToHub {
            hub: self.clone(),
            capture,
        }
    }

    fn register(&self, subscriber: BoxSubscriber<T>) {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let active = Rc::new(Cell::new(true));
        let subscriber = Rc::new(RefCell::new(subscriber));

        {
            let hub = self.clone();
            let flag = Rc::clone(&active);
            let subscription = Subscription::new(move || {
                flag.set(false);
                hub.inner.downstream.borrow_mut().retain(|slot| slot.id != id);
            });
            subscriber.borrow_mut().on_subscribe(subscription);
        }

        let terminal = self.inner.terminal.borrow().clone();
        match self.inner.mode {
            HubMode::Subject => {}
            HubMode::Replay => {
                let cached: Vec<T> = self.inner.cache.borrow().iter().cloned().collect();
                for item in cached {
                    if !active.get() {
                        return;
                    }
                    subscriber.borrow_mut().on_item(item);
                }
            }
            HubMode::AsyncLast => {
                if matches!(terminal, Some(Terminal::Complete)) {
                    let last = self.inner.cache.borrow().peek().cloned();
                    if let Some(item) = last {
                        if !active.get() {
                            return;
                        }
                        subscriber.borrow_mut().on_item(item);
                    }
                }
            }
        }

        if !active.get() {
            return;
        }
        match terminal {
            Some(Terminal::Complete) => subscriber.borrow_mut().on_complete(),
            Some(Terminal::Error(error)) => subscriber.borrow_mut().on_error(error),
            None => self.inner.downstream.borrow_mut().push(DownstreamSlot {
                id,
                active,
                subscriber,
            }),
        }
    }

    pub(crate) fn register_upstream(&self, subscription: Subscription) {
        if self.is_terminated() {
            subscription.cancel();
            return;
        }
        self.inner.upstream.borrow_mut().push(subscription);
    }

    fn cache_item(&self, item: T) {
        if self.inner.cache_capacity == 0 {
            return;
        }
        let mut cache = self.inner.cache.borrow_mut();
        if cache.len() == self.inner.cache_capacity {
            let _ = cache.pop();
        }
        cache.add(item);
    }

    fn broadcast_item(&self, item: &T) {
        for (active, subscriber) in self.snapshot() {
            if !active.get() {
                continue;
            }
            self.deliver(&subscriber, |s| s.on_item(item.clone()));
        }
    }

    fn snapshot(&self) -> Snapshot<T> {
        self.inner
            .downstream
            .borrow()
            .iter()
            .map(|slot| (Rc::clone(&slot.active), Rc::clone(&slot.subscriber)))
            .collect()
    }

    /// Delivers one signal to one subscriber slot. A slot whose cell is
    /// already borrowed is being delivered to re-entrantly, which the
    /// protocol forbids.
    fn deliver(
        &self,
        subscriber: &Rc<RefCell<BoxSubscriber<T>>>,
        signal: impl FnOnce(&mut BoxSubscriber<T>),
    ) {
        match subscriber.try_borrow_mut() {
            Ok(mut subscriber) => signal(&mut subscriber),
            Err(_) => self.report_violation("re-entrant delivery to a hub subscriber"),
        }
    }

    fn cancel_upstreams(&self) {
        let upstreams = std::mem::take(&mut *self.inner.upstream.borrow_mut());
        for subscription in upstreams {
            subscription.cancel();
        }
    }

    fn report_violation(&self, message: &str) {
        if config::get().check_invariants {
            panic!("protocol violation: {message}");
        }
        tracing::warn!(message, "hub protocol violation");
    }
}

struct ForwardToHub<T: Clone + 'static> {
    hub: Hub<T>,
    capture: Rc<RefCell<Option<Subscription>>>,
}

impl<T: Clone + 'static> Subscriber<T> for ForwardToHub<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        *self.capture.borrow_mut() = Some(subscription.clone());
        self.hub.register_upstream(subscription);
    }

    fn on_item(&mut self, item: T) {
        self.hub.next(item);
    }

    fn on_error(&mut self, error: StreamError) {
        self.hub.error(error);
        self.capture.borrow_mut().take();
    }

    fn on_complete(&mut self) {
        self.hub.complete();
        self.capture.borrow_mut().take();
    }
}
