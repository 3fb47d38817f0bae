//! Prefix-limiting operators: `take`, `take_while`, `first`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct TakeWorker<T> {
    downstream: BoxSubscriber<T>,
    remaining: usize,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for TakeWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
        if self.remaining == 0 && !self.link.is_done() {
            self.downstream.on_complete();
            self.link.cancel_upstream();
        }
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        self.remaining -= 1;
        self.downstream.on_item(item);
        if self.remaining == 0 && !self.link.is_done() {
            self.downstream.on_complete();
            self.link.cancel_upstream();
        }
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

struct TakeWhileWorker<T, F: FnMut(&T) -> bool> {
    downstream: BoxSubscriber<T>,
    predicate: F,
    link: Rc<StageLink>,
}

impl<T, F: FnMut(&T) -> bool> Subscriber<T> for TakeWhileWorker<T, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if (self.predicate)(&item) {
            self.downstream.on_item(item);
        } else {
            self.downstream.on_complete();
            self.link.cancel_upstream();
        }
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

impl<T: 'static> Stream<T> {
    /// Emits the first `count` items, delivers the completion right after
    /// the last of them, and cancels upstream.
    #[must_use]
    pub fn take(self, count: usize) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(TakeWorker {
                downstream,
                remaining: count,
                link: StageLink::new(),
            });
        })
    }

    /// Emits items while `predicate` holds; the first failing item is
    /// dropped, the stream completes, and upstream is cancelled.
    #[must_use]
    pub fn take_while<F>(self, predicate: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(TakeWhileWorker {
                downstream,
                predicate: predicate.clone(),
                link: StageLink::new(),
            });
        })
    }

    /// Emits only the first item, then completes.
    #[must_use]
    pub fn first(self) -> Stream<T> {
        self.take(1)
    }
}

#[cfg(test)]
mod tests {
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_take_limits_and_completes() {
        let (subscriber, probe) = TestSubscriber::new();
        source::range(42, 20).take(5).subscribe(subscriber);
        assert_eq!(probe.items(), vec![42, 43, 44, 45, 46]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_take_cancels_upstream_at_nth_item() {
        // The upstream peek sees exactly the taken items: the cancel lands
        // at the 5th item, before the source can emit a 6th.
        let upstream_seen = std::rc::Rc::new(std::cell::Cell::new(0));
        let count = std::rc::Rc::clone(&upstream_seen);
        let (subscriber, probe) = TestSubscriber::new();
        source::range(0, 100)
            .peek(move |_: &i64| count.set(count.get() + 1))
            .take(5)
            .subscribe(subscriber);
        assert_eq!(probe.item_count(), 5);
        assert_eq!(upstream_seen.get(), 5);
    }

    #[test]
    fn test_take_more_than_available() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2]).take(10).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_take_zero_completes_immediately() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2]).take(0).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }

    #[test]
    fn test_take_composition_law() {
        // take(n).take(m) ≡ take(min(n, m))
        let (chained, chained_probe) = TestSubscriber::new();
        source::range(0, 10).take(7).take(3).subscribe(chained);
        let (direct, direct_probe) = TestSubscriber::new();
        source::range(0, 10).take(3).subscribe(direct);
        assert_eq!(chained_probe.items(), direct_probe.items());
        assert!(chained_probe.is_completed());
    }

    #[test]
    fn test_take_while() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![2, 4, 5, 6])
            .take_while(|v| v % 2 == 0)
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![2, 4]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_first() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![9, 8, 7]).first().subscribe(subscriber);
        assert_eq!(probe.items(), vec![9]);
        assert!(probe.is_completed());
    }
}
