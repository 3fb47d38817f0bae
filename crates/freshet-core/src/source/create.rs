//! The `create` source: hand the subscriber side to user code.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::stream::{BoxSubscriber, Stream, StreamError, Subscription};

struct EmitterState<T> {
    subscriber: RefCell<BoxSubscriber<T>>,
    subscription: Subscription,
    done: Cell<bool>,
}

/// The emission handle passed to a [`create`] producer.
///
/// Signals delivered after a terminal signal, or after the downstream
/// cancelled, are silently dropped — the producer can keep calling
/// [`Emitter::next`] and rely on the protocol being enforced here.
pub struct Emitter<T> {
    state: Rc<EmitterState<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Emitter<T> {
    /// Emits an item.
    pub fn next(&self, item: T) {
        if self.is_done() {
            return;
        }
        self.state.subscriber.borrow_mut().on_item(item);
    }

    /// Signals the terminal error.
    pub fn error(&self, error: StreamError) {
        if self.is_done() {
            return;
        }
        self.state.done.set(true);
        self.state.subscriber.borrow_mut().on_error(error);
    }

    /// Signals completion.
    pub fn complete(&self) {
        if self.is_done() {
            return;
        }
        self.state.done.set(true);
        self.state.subscriber.borrow_mut().on_complete();
    }

    /// Returns true once the downstream cancelled or a terminal signal was
    /// emitted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.done.get() || self.state.subscription.is_cancelled()
    }
}

/// Creates a stream whose items are produced by user code: `producer` runs
/// once per subscription and drives the given [`Emitter`].
pub fn create<T, F>(producer: F) -> Stream<T>
where
    T: 'static,
    F: Fn(Emitter<T>) + 'static,
{
    Stream::from_subscribe_fn(move |mut subscriber| {
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        let emitter = Emitter {
            state: Rc::new(EmitterState {
                subscriber: RefCell::new(subscriber),
                subscription,
                done: Cell::new(false),
            }),
        };
        producer(emitter);
    })
}
