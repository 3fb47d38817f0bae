//! The `default_if_empty` operator.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct DefaultIfEmptyWorker<T: Clone> {
    downstream: BoxSubscriber<T>,
    default_value: T,
    item_emitted: bool,
    link: Rc<StageLink>,
}

impl<T: Clone> Subscriber<T> for DefaultIfEmptyWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        self.item_emitted = true;
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
        if !self.item_emitted {
            self.downstream.on_item(self.default_value.clone());
            if self.link.is_done() {
                return;
            }
        }
        self.link.mark_done();
        self.downstream.on_complete();
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Emits `default_value` right before completion when the upstream
    /// completed without a single item.
    #[must_use]
    pub fn default_if_empty(self, default_value: T) -> Stream<T> {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(DefaultIfEmptyWorker {
                downstream,
                default_value: default_value.clone(),
                item_emitted: false,
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
    fn test_empty_upstream_yields_default() {
        let (subscriber, probe) = TestSubscriber::new();
        source::empty().default_if_empty(7).subscribe(subscriber);
        assert_eq!(probe.items(), vec![7]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_nonempty_upstream_passes_through() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2]).default_if_empty(7).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_error_bypasses_default() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::fail::<i32>(crate::stream::StreamError::message("x"))
            .default_if_empty(7)
            .subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.error().is_some());
    }
}
