//! Filtering operators: `filter`, `filter_successive`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct FilterWorker<T, F: FnMut(&T) -> bool> {
    downstream: BoxSubscriber<T>,
    predicate: F,
    link: Rc<StageLink>,
}

impl<T, F: FnMut(&T) -> bool> Subscriber<T> for FilterWorker<T, F> {
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

struct FilterSuccessiveWorker<T: Clone, F: FnMut(&T, &T) -> bool> {
    downstream: BoxSubscriber<T>,
    predicate: F,
    last_emitted: Option<T>,
    link: Rc<StageLink>,
}

impl<T: Clone, F: FnMut(&T, &T) -> bool> Subscriber<T> for FilterSuccessiveWorker<T, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        let passes = match &self.last_emitted {
            Some(last) => (self.predicate)(last, &item),
            None => true,
        };
        if passes {
            self.last_emitted = Some(item.clone());
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

impl<T: 'static> Stream<T> {
    /// Drops items for which `predicate` returns false.
    #[must_use]
    pub fn filter<F>(self, predicate: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(FilterWorker {
                downstream,
                predicate: predicate.clone(),
                link: StageLink::new(),
            });
        })
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Passes an item only when `predicate(last_emitted, current)` holds;
    /// the first item always passes.
    #[must_use]
    pub fn filter_successive<F>(self, predicate: F) -> Stream<T>
    where
        F: FnMut(&T, &T) -> bool + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(FilterSuccessiveWorker {
                downstream,
                predicate: predicate.clone(),
                last_emitted: None,
                link: StageLink::new(),
            });
        })
    }
}
