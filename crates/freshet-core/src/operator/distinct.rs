//! The `distinct` operator.

use std::hash::Hash;
use std::rc::Rc;

use fxhash::FxHashSet;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct DistinctWorker<T: Eq + Hash + Clone> {
    downstream: BoxSubscriber<T>,
    seen: FxHashSet<T>,
    link: Rc<StageLink>,
}

impl<T: Eq + Hash + Clone> Subscriber<T> for DistinctWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        if self.seen.insert(item.clone()) {
            self.downstream.on_item(item);
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

impl<T: Eq + Hash + Clone + 'static> Stream<T> {
    /// Drops items equal to any item already emitted. Equality is by
    /// value; each subscription keeps its own seen set.
    #[must_use]
    pub fn distinct(self) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(DistinctWorker {
                downstream,
                seen: FxHashSet::default(),
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
    fn test_distinct_drops_duplicates() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2, 1, 3, 2, 4])
            .distinct()
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2, 3, 4]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_distinct_seen_set_is_per_subscription() {
        let stream = source::of(vec![1, 1, 2]).distinct();
        let (first, first_probe) = TestSubscriber::new();
        stream.clone().subscribe(first);
        let (second, second_probe) = TestSubscriber::new();
        stream.subscribe(second);
        assert_eq!(first_probe.items(), vec![1, 2]);
        assert_eq!(second_probe.items(), vec![1, 2]);
    }
}
