//! Synchronous sources: emit everything during `subscribe`.

use std::rc::Rc;

use crate::stream::{BoxSubscriber, Stream, StreamError, Subscription};

/// Emits each item of `values`, then completes. Cancellation is honored
/// between items.
fn push_values<T: Clone>(values: &[T], subscriber: &mut BoxSubscriber<T>) {
    let subscription = Subscription::unattached();
    subscriber.on_subscribe(subscription.clone());
    for value in values {
        if subscription.is_cancelled() {
            return;
        }
        subscriber.on_item(value.clone());
    }
    if !subscription.is_cancelled() {
        subscriber.on_complete();
    }
}

/// Creates a stream that emits the given items and then completes.
pub fn of<T: Clone + 'static>(values: impl IntoIterator<Item = T>) -> Stream<T> {
    let values: Rc<Vec<T>> = Rc::new(values.into_iter().collect());
    Stream::from_subscribe_fn(move |mut subscriber| push_values(&values, &mut subscriber))
}

/// Creates a stream that emits the items of a collection and then
/// completes. Alias of [`of`] for call sites holding a collection.
pub fn from_iter<T: Clone + 'static>(values: impl IntoIterator<Item = T>) -> Stream<T> {
    of(values)
}

/// Creates a stream that emits the value if present, then completes.
pub fn of_option<T: Clone + 'static>(value: Option<T>) -> Stream<T> {
    of(value)
}

/// Creates a stream that emits no items and immediately completes.
#[must_use]
pub fn empty<T: Clone + 'static>() -> Stream<T> {
    of(Vec::new())
}

/// Creates a stream that emits no items and immediately signals `error`.
#[must_use]
pub fn fail<T: 'static>(error: StreamError) -> Stream<T> {
    Stream::from_subscribe_fn(move |mut subscriber| {
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        if !subscription.is_cancelled() {
            subscriber.on_error(error.clone());
        }
    })
}

/// Creates a stream that emits `start..start + count` and then completes.
#[must_use]
pub fn range(start: i64, count: u32) -> Stream<i64> {
    Stream::from_subscribe_fn(move |mut subscriber| {
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        for offset in 0..count {
            if subscription.is_cancelled() {
                return;
            }
            subscriber.on_item(start + i64::from(offset));
        }
        if !subscription.is_cancelled() {
            subscriber.on_complete();
        }
    })
}

/// Creates a stream that emits nothing, never completes and never fails.
#[must_use]
pub fn never<T: 'static>() -> Stream<T> {
    Stream::from_subscribe_fn(|mut subscriber| {
        subscriber.on_subscribe(Subscription::unattached());
    })
}

/// Creates a stream that emits one item obtained from `supplier`, then
/// completes.
pub fn from_supplier<T, F>(supplier: F) -> Stream<T>
where
    T: 'static,
    F: FnMut() -> T + Clone + 'static,
{
    Stream::from_subscribe_fn(move |mut subscriber| {
        let mut supplier = supplier.clone();
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        if subscription.is_cancelled() {
            return;
        }
        subscriber.on_item(supplier());
        if !subscription.is_cancelled() {
            subscriber.on_complete();
        }
    })
}

/// Creates a stream that emits one item obtained from `supplier`, then
/// completes; a failed supplier becomes the stream's error signal.
pub fn try_from_supplier<T, F>(supplier: F) -> Stream<T>
where
    T: 'static,
    F: FnMut() -> Result<T, StreamError> + Clone + 'static,
{
    Stream::from_subscribe_fn(move |mut subscriber| {
        let mut supplier = supplier.clone();
        let subscription = Subscription::unattached();
        subscriber.on_subscribe(subscription.clone());
        if subscription.is_cancelled() {
            return;
        }
        match supplier() {
            Ok(value) => {
                subscriber.on_item(value);
                if !subscription.is_cancelled() {
                    subscriber.on_complete();
                }
            }
            Err(error) => subscriber.on_error(error),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_of_emits_then_completes() {
        let (subscriber, probe) = TestSubscriber::new();
        of(vec![1, 2, 3]).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2, 3]);
        assert!(probe.is_completed());
        assert_eq!(probe.subscribe_calls(), 1);
    }

    #[test]
    fn test_of_supports_multiple_subscriptions() {
        let stream = of(vec![1, 2]);
        let (first, first_probe) = TestSubscriber::new();
        let (second, second_probe) = TestSubscriber::new();
        stream.subscribe(first);
        stream.subscribe(second);
        assert_eq!(first_probe.items(), vec![1, 2]);
        assert_eq!(second_probe.items(), vec![1, 2]);
    }

    #[test]
    fn test_of_option() {
        let (subscriber, probe) = TestSubscriber::new();
        of_option(Some(9)).subscribe(subscriber);
        assert_eq!(probe.items(), vec![9]);

        let (subscriber, probe) = TestSubscriber::<i32>::new();
        of_option(None).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }

    #[test]
    fn test_empty_completes_immediately() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        empty().subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }

    #[test]
    fn test_fail_errors_immediately() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        fail(StreamError::message("kaput")).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(!probe.is_completed());
        assert_eq!(probe.error().unwrap().to_string(), "kaput");
    }

    #[test]
    fn test_range() {
        let (subscriber, probe) = TestSubscriber::new();
        range(42, 5).subscribe(subscriber);
        assert_eq!(probe.items(), vec![42, 43, 44, 45, 46]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_range_of_zero_is_empty() {
        let (subscriber, probe) = TestSubscriber::new();
        range(7, 0).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert!(probe.is_completed());
    }

    #[test]
    fn test_cancel_mid_emission_halts_at_item_boundary() {
        let (subscriber, probe) = TestSubscriber::cancelling_after(2);
        of(vec![1, 2, 3, 4]).subscribe(subscriber);
        assert_eq!(probe.items(), vec![1, 2]);
        assert!(!probe.is_terminated());
    }

    #[test]
    fn test_never_only_subscribes() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        never().subscribe(subscriber);
        assert_eq!(probe.subscribe_calls(), 1);
        assert!(probe.items().is_empty());
        assert!(!probe.is_terminated());
        assert!(probe.is_subscribed());
    }

    #[test]
    fn test_from_supplier_emits_once() {
        let (subscriber, probe) = TestSubscriber::new();
        from_supplier(|| 41 + 1).subscribe(subscriber);
        assert_eq!(probe.items(), vec![42]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_try_from_supplier_error() {
        let (subscriber, probe) = TestSubscriber::<i32>::new();
        try_from_supplier(|| Err(StreamError::message("supplier failed"))).subscribe(subscriber);
        assert!(probe.items().is_empty());
        assert_eq!(probe.error().unwrap().to_string(), "supplier failed");
    }
}
