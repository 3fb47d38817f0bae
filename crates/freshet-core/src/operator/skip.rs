//! Prefix-dropping operators: `skip`, `drop_while`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct SkipWorker<T> {
    downstream: BoxSubscriber<T>,
    remaining: usize,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for SkipWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return;
        }
        self.downstream.on_item(item);
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

struct DropWhileWorker<T, F: FnMut(&T) -> bool> {
    downstream: BoxSubscriber<T>,
    predicate: F,
    dropping: bool,
    link: Rc<StageLink>,
}

impl<T, F: FnMut(&T) -> bool> Subscriber<T> for DropWhileWorker<T, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if self.dropping {
            if (self.predicate)(&item) {
                return;
            }
            self.dropping = false;
        }
        self.downstream.on_item(item);
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
    /// Swallows the first `count` items.
    #[must_use]
    pub fn skip(self, count: usize) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(SkipWorker {
                downstream,
                remaining: count,
                link: StageLink::new(),
            });
        })
    }

    /// Swallows items while `predicate` holds; the first failing item and
    /// everything after it pass through.
    #[must_use]
    pub fn drop_while<F>(self, predicate: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(DropWhileWorker {
                downstream,
                predicate: predicate.clone(),
                dropping: true,
                link: StageLink::new(),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_skip_swallows_prefix() {
        let (subscriber, probe) = TestSubscriber::new();
        source::range(0, 6).skip(2).subscribe(subscriber);
        assert_eq!(probe.items(), vec![2, 3, 4, 5]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_skip_composition_law() {
        // skip(n).skip(m) ≡ skip(n + m)
        let (chained, chained_probe) = TestSubscriber::new();
        source::range(0, 10).skip(2).skip(3).subscribe(chained);
        let (direct, direct_probe) = TestSubscriber::new();
        source::range(0, 10).skip(5).subscribe(direct);
        assert_eq!(chained_probe.items(), direct_probe.items());
    }

    #[test]
    fn test_skip_past_end_completes_empty() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2]).skip(5).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }

    #[test]
    fn test_drop_while() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 3, 5, 4, 1, 6])
            .drop_while(|v| v % 2 == 1)
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![4, 1, 6]);
        assert!(probe.is_completed());
    }
}
