//! Chunking operators: `buffer`, `window`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct BufferWorker<T> {
    downstream: BoxSubscriber<Vec<T>>,
    chunk: Vec<T>,
    size: usize,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for BufferWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        self.chunk.push(item);
        if self.chunk.len() == self.size {
            let full = std::mem::replace(&mut self.chunk, Vec::with_capacity(self.size));
            self.downstream.on_item(full);
        }
    }

    fn on_error(&mut self, error: StreamError) {
        if self.link.is_done() {
            return;
        }
        self.chunk.clear();
        self.link.mark_done();
        self.downstream.on_error(error);
    }

    fn on_complete(&mut self) {
        if self.link.is_done() {
            return;
        }
        if !self.chunk.is_empty() {
            let remainder = std::mem::take(&mut self.chunk);
            self.downstream.on_item(remainder);
            if self.link.is_done() {
                return;
            }
        }
        self.link.mark_done();
        self.downstream.on_complete();
    }
}

impl<T: 'static> Stream<T> {
    /// Accumulates `size` items and emits them as one `Vec`. A partial
    /// chunk is flushed right before completion; an upstream error
    /// discards it.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    #[must_use]
    pub fn buffer(self, size: usize) -> Stream<Vec<T>> {
        assert!(size > 0, "size must be > 0");
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(BufferWorker {
                downstream,
                chunk: Vec::with_capacity(size),
                size,
                link: StageLink::new(),
            });
        })
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Accumulates `size` items and emits them as a sub-stream.
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    #[must_use]
    pub fn window(self, size: usize) -> Stream<Stream<T>> {
        self.buffer(size).map(crate::source::of)
    }
}

#[cfg(test)]
mod tests {
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_buffer_emits_full_chunks() {
        let (subscriber, probe) = TestSubscriber::new();
        source::range(0, 6).buffer(2).subscribe(subscriber);
        assert_eq!(probe.items(), vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_buffer_flushes_remainder_on_complete() {
        let (subscriber, probe) = TestSubscriber::new();
        source::range(0, 5).buffer(2).subscribe(subscriber);
        assert_eq!(probe.items(), vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_window_emits_substreams() {
        let (subscriber, probe) = TestSubscriber::new();
        source::range(0, 4).window(2).subscribe(subscriber);
        let windows = probe.items();
        assert_eq!(windows.len(), 2);

        let (first, first_probe) = TestSubscriber::new();
        windows[0].subscribe(first);
        assert_eq!(first_probe.items(), vec![0, 1]);
        assert!(first_probe.is_completed());

        let (second, second_probe) = TestSubscriber::new();
        windows[1].subscribe(second);
        assert_eq!(second_probe.items(), vec![2, 3]);
    }
}
