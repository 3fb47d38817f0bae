//! The `start_with` operator.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

/// Tail worker subscribed to the upstream after the prefix was emitted.
/// The downstream already received its `on_subscribe`, so the upstream's
/// handle is attached silently.
struct StartWithTail<T> {
    downstream: BoxSubscriber<T>,
    link: Rc<StageLink>,
}

impl<T> Subscriber<T> for StartWithTail<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
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

impl<T: Clone + 'static> Stream<T> {
    /// Emits the given values before the upstream's items. The downstream
    /// observes a single logical sequence: one `on_subscribe`, the prefix,
    /// then the upstream items and its terminal.
    #[must_use]
    pub fn start_with(self, values: impl IntoIterator<Item = T>) -> Stream<T> {
        let values: Rc<Vec<T>> = Rc::new(values.into_iter().collect());
        Stream::from_subscribe_fn(move |mut downstream| {
            let link = StageLink::new();
            downstream.on_subscribe(link.subscription());
            for value in values.iter() {
                if link.is_done() {
                    return;
                }
                downstream.on_item(value.clone());
            }
            if link.is_done() {
                return;
            }
            self.subscribe(StartWithTail {
                downstream,
                link,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_prefix_comes_first() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![3, 4])
            .start_with(vec![1, 2])
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2, 3, 4]);
        assert!(probe.is_completed());
        assert_eq!(probe.subscribe_calls(), 1);
    }

    #[test]
    fn test_start_with_composition_law() {
        // start_with(a).start_with(b) ≡ start_with(b, a): b first.
        let (chained, chained_probe) = TestSubscriber::new();
        source::of(vec![9])
            .start_with(vec![1])
            .start_with(vec![2])
            .subscribe(chained);
        let (direct, direct_probe) = TestSubscriber::new();
        source::of(vec![9]).start_with(vec![2, 1]).subscribe(direct);
        assert_eq!(chained_probe.items(), direct_probe.items());
        assert_eq!(chained_probe.items(), vec![2, 1, 9]);
    }

    #[test]
    fn test_cancel_during_prefix_never_subscribes_upstream() {
        let upstream_subscribed = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&upstream_subscribed);
        let upstream: crate::stream::Stream<i32> =
            crate::stream::Stream::from_subscribe_fn(move |mut subscriber| {
                flag.set(true);
                subscriber.on_subscribe(crate::stream::Subscription::unattached());
            });

        let (subscriber, probe) = TestSubscriber::cancelling_after(1);
        upstream.start_with(vec![1, 2]).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1]);
        assert!(!upstream_subscribed.get());
    }
}
