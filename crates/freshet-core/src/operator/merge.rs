//! Higher-order flattening: `merge_all`, `concat_all` and their mapped
//! variants.
//!
//! `merge_all(k)` subscribes up to `k` inner streams concurrently; further
//! inner streams queue in arrival order and start as active ones complete.
//! `concat_all` is `merge_all(1)`: full serialization. An error from the
//! outer stream or any inner stream cancels everything and propagates.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::buffer::CircularBuffer;
use crate::stream::{BoxSubscriber, Stream, StreamError, Subscriber, Subscription};

struct MergeShared<T: 'static> {
    downstream: RefCell<BoxSubscriber<T>>,
    /// Inner streams awaiting a free concurrency slot, in arrival order.
    pending: RefCell<CircularBuffer<Stream<T>>>,
    /// Cancel handles of the currently subscribed inner streams.
    inners: RefCell<Vec<(u64, Subscription)>>,
    outer: RefCell<Option<Subscription>>,
    outer_done: Cell<bool>,
    done: Cell<bool>,
    active: Cell<usize>,
    next_id: Cell<u64>,
    max_concurrent: usize,
}

impl<T: 'static> MergeShared<T> {
    fn new(downstream: BoxSubscriber<T>, max_concurrent: usize) -> Rc<Self> {
        Rc::new(Self {
            downstream: RefCell::new(downstream),
            pending: RefCell::new(CircularBuffer::new(4)),
            inners: RefCell::new(Vec::new()),
            outer: RefCell::new(None),
            outer_done: Cell::new(false),
            done: Cell::new(false),
            active: Cell::new(0),
            next_id: Cell::new(0),
            max_concurrent,
        })
    }

    fn start_inner(self: &Rc<Self>, stream: &Stream<T>) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.active.set(self.active.get() + 1);
        stream.subscribe(InnerWorker {
            shared: Rc::clone(self),
            id,
        });
    }

    fn inner_completed(self: &Rc<Self>, id: u64) {
        self.inners.borrow_mut().retain(|(inner_id, _)| *inner_id != id);
        self.active.set(self.active.get() - 1);

        let next = self.pending.borrow_mut().pop();
        if let Some(stream) = next {
            self.start_inner(&stream);
            return;
        }
        if self.outer_done.get() && self.active.get() == 0 {
            self.done.set(true);
            self.downstream.borrow_mut().on_complete();
        }
    }

    /// Terminal error from the outer stream or any inner stream: cancel
    /// everything still live and propagate.
    fn fail(&self, error: StreamError) {
        self.done.set(true);
        self.cancel_all();
        self.downstream.borrow_mut().on_error(error);
    }

    fn cancel_all(&self) {
        let outer = self.outer.borrow_mut().take();
        if let Some(subscription) = outer {
            subscription.cancel();
        }
        let inners = std::mem::take(&mut *self.inners.borrow_mut());
        for (_, subscription) in inners {
            subscription.cancel();
        }
        self.pending.borrow_mut().clear();
    }
}

struct OuterWorker<T: 'static> {
    shared: Rc<MergeShared<T>>,
}

impl<T: 'static> Subscriber<Stream<T>> for OuterWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.shared.done.get() {
            subscription.cancel();
            return;
        }
        *self.shared.outer.borrow_mut() = Some(subscription);
        let shared = Rc::clone(&self.shared);
        let downstream_subscription = Subscription::new(move || {
            shared.done.set(true);
            shared.cancel_all();
        });
        self.shared
            .downstream
            .borrow_mut()
            .on_subscribe(downstream_subscription);
    }

    fn on_item(&mut self, stream: Stream<T>) {
        if self.shared.done.get() {
            return;
        }
        if self.shared.active.get() < self.shared.max_concurrent {
            self.shared.start_inner(&stream);
        } else {
            self.shared.pending.borrow_mut().add(stream);
        }
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
        if self.shared.active.get() == 0 && self.shared.pending.borrow().is_empty() {
            self.shared.done.set(true);
            self.shared.downstream.borrow_mut().on_complete();
        }
    }
}

struct InnerWorker<T: 'static> {
    shared: Rc<MergeShared<T>>,
    id: u64,
}

impl<T: 'static> Subscriber<T> for InnerWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        if self.shared.done.get() {
            subscription.cancel();
            return;
        }
        self.shared.inners.borrow_mut().push((self.id, subscription));
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
        self.shared.inner_completed(self.id);
    }
}

impl<T: 'static> Stream<Stream<T>> {
    /// Flattens a stream of streams, running up to `max_concurrent` inner
    /// streams at a time; excess inner streams queue in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    #[must_use]
    pub fn merge_all(self, max_concurrent: usize) -> Stream<T> {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(OuterWorker {
                shared: MergeShared::new(downstream, max_concurrent),
            });
        })
    }

    /// Flattens a stream of streams one inner stream at a time, in order.
    #[must_use]
    pub fn concat_all(self) -> Stream<T> {
        self.merge_all(1)
    }
}

impl<T: 'static> Stream<T> {
    /// Maps each item to a stream and merges up to `max_concurrent` of
    /// them concurrently.
    #[must_use]
    pub fn merge_map<R, F>(self, mapper: F, max_concurrent: usize) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Stream<R> + Clone + 'static,
    {
        self.map(mapper).merge_all(max_concurrent)
    }

    /// Maps each item to a stream and merges them without a concurrency
    /// bound.
    #[must_use]
    pub fn flat_map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Stream<R> + Clone + 'static,
    {
        self.merge_map(mapper, usize::MAX)
    }

    /// Maps each item to a stream and concatenates them in order.
    #[must_use]
    pub fn concat_map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Stream<R> + Clone + 'static,
    {
        self.map(mapper).concat_all()
    }

    /// Emits all of this stream, then all of `next`.
    #[must_use]
    pub fn concat_with(self, next: Stream<T>) -> Stream<T> {
        crate::source::of(vec![self, next]).concat_all()
    }

    /// Interleaves this stream with `other`, emitting items as either
    /// produces them.
    #[must_use]
    pub fn merge_with(self, other: Stream<T>) -> Stream<T> {
        crate::source::of(vec![self, other]).merge_all(usize::MAX)
    }
}
