//! The `last_n` operator.

use std::rc::Rc;

use crate::buffer::CircularBuffer;
use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct LastWorker<T> {
    downstream: BoxSubscriber<T>,
    buffer: CircularBuffer<T>,
    capacity: usize,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for LastWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if self.buffer.len() == self.capacity {
            let _ = self.buffer.pop();
        }
        self.buffer.add(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.link.is_done() {
            return;
        }
        self.buffer.clear();
        self.link.mark_done();
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if self.link.is_done() {
            return;
        }
        while let Some(value) = self.buffer.pop() {
            self.downstream.on_item(value);
            if self.link.is_done() {
                return;
            }
        }
        self.link.mark_done();
        self.downstream.on_complete();
    }
}

impl<T: 'static> Stream<T> {
    /// Holds back everything except the final `count` items: they are
    /// emitted in order when the upstream completes, followed by the
    /// completion. An upstream error discards the held items.
    ///
    /// # Panics
    ///
    /// Panics if `count` is 0.
    #[must_use]
    pub fn last_n(self, count: usize) -> Stream<T> {
        assert!(count > 0, "count must be > 0");
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(LastWorker {
                downstream,
                buffer: CircularBuffer::new(count),
                capacity: count,
                link: StageLink::new(),
            });
        })
    }

    /// Emits only the final item, when the upstream completes.
    #[must_use]
    pub fn last(self) -> Stream<T> {
        self.last_n(1)
    }
}
