//! Transforming operators: `map`, `try_map`, `scan`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct MapWorker<T, R, F: FnMut(T) -> R> {
    downstream: BoxSubscriber<R>,
    mapper: F,
    link: Rc<StageLink>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, R, F: FnMut(T) -> R> Subscriber<T> for MapWorker<T, R, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        let mapped = (self.mapper)(item);
        self.downstream.on_item(mapped);
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

struct TryMapWorker<T, R, F: FnMut(T) -> Result<R, StreamError>> {
    downstream: BoxSubscriber<R>,
    mapper: F,
    link: Rc<StageLink>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, R, F: FnMut(T) -> Result<R, StreamError>> Subscriber<T> for TryMapWorker<T, R, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        match (self.mapper)(item) {
            Ok(mapped) => self.downstream.on_item(mapped),
            Err(error) => {
                self.link.cancel_upstream();
                self.downstream.on_error(error);
            }
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

struct ScanWorker<T, A: Clone, F: FnMut(A, T) -> A> {
    downstream: BoxSubscriber<A>,
    accumulator: F,
    acc: A,
    link: Rc<StageLink>,
    _marker: std::marker::PhantomData<T>,
}

impl<T, A: Clone, F: FnMut(A, T) -> A> Subscriber<T> for ScanWorker<T, A, F> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        self.downstream.on_subscribe(self.link.subscription());
    }

    fn on_item(&mut self, item: T) {
        if self.link.is_done() {
            return;
        }
        self.acc = (self.accumulator)(self.acc.clone(), item);
        self.downstream.on_item(self.acc.clone());
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
    /// Transforms each item with `mapper`.
    #[must_use]
    pub fn map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> R + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(MapWorker {
                downstream,
                mapper: mapper.clone(),
                link: StageLink::new(),
                _marker: std::marker::PhantomData,
            });
        })
    }

    /// Transforms each item with a fallible `mapper`. An `Err` becomes the
    /// stream's error signal and the upstream is cancelled.
    #[must_use]
    pub fn try_map<R, F>(self, mapper: F) -> Stream<R>
    where
        R: 'static,
        F: FnMut(T) -> Result<R, StreamError> + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(TryMapWorker {
                downstream,
                mapper: mapper.clone(),
                link: StageLink::new(),
                _marker: std::marker::PhantomData,
            });
        })
    }

    /// Emits the running accumulation of `accumulator` over the items,
    /// starting from `initial`. The seed itself is not emitted.
    #[must_use]
    pub fn scan<A, F>(self, initial: A, accumulator: F) -> Stream<A>
    where
        A: Clone + 'static,
        F: FnMut(A, T) -> A + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(ScanWorker {
                downstream,
                accumulator: accumulator.clone(),
                acc: initial.clone(),
                link: StageLink::new(),
                _marker: std::marker::PhantomData,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::source;
    use crate::stream::StreamError;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_map_transforms_items() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2, 3]).map(|v| v * 10).subscribe(subscriber);
        assert_eq!(probe.items(), vec![10, 20, 30]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_map_identity_law() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2, 3]).map(|v| v).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2, 3]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_map_forwards_error() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        source::fail::<i32>(StreamError::message("upstream"))
            .map(|v| v + 1)
            .subscribe(subscriber);
        assert_eq!(probe.error().unwrap().to_string(), "upstream");
    }

    #[test]
    fn test_map_mapper_state_is_per_subscription() {
        let mut count = 0;
        let stream = source::of(vec![10, 20]).map(move |v| {
            count += 1;
            v + count
        });

        let (first, first_probe) = TestSubscriber::new();
        stream.clone().subscribe(first);
        let (second, second_probe) = TestSubscriber::new();
        stream.subscribe(second);

        assert_eq!(first_probe.items(), vec![11, 22]);
        assert_eq!(second_probe.items(), vec![11, 22]);
    }

    #[test]
    fn test_try_map_error_cancels_upstream() {
        let (subscriber, probe) = TestSubscriber::new();
        let mut seen = Vec::new();
        let peeked = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let upstream_log = std::rc::Rc::clone(&peeked);
        source::of(vec![1, 2, 3, 4])
            .peek(move |v: &i32| upstream_log.borrow_mut().push(*v))
            .try_map(move |v| {
                seen.push(v);
                if v == 3 {
                    Err(StreamError::message("three is right out"))
                } else {
                    Ok(v)
                }
            })
            .subscribe(subscriber);

        assert_eq!(probe.items(), vec![1, 2]);
        assert_eq!(probe.error().unwrap().to_string(), "three is right out");
        // Upstream stopped at the failing item.
        assert_eq!(*peeked.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_scan_emits_running_totals() {
        let (subscriber, probe) = TestSubscriber::new();
        source::of(vec![1, 2, 3, 4])
            .scan(0, |acc, v| acc + v)
            .subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 3, 6, 10]);
        assert!(probe.is_completed());
    }
}
