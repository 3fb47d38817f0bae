//! Timed sources driven by a [`Scheduler`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::scheduler::Scheduler;
use crate::stream::{Stream, StreamError, Subscription};

/// Creates a stream that emits 0, 1, 2, … every `period` clock units on
/// `scheduler`. The stream never completes; it runs until cancelled.
///
/// The first item is emitted at `now() + period`. Subscribing after the
/// scheduler has shut down yields an immediate error signal.
#[must_use]
pub fn periodic(scheduler: &Scheduler, period: u64) -> Stream<u64> {
    let scheduler = scheduler.clone();
    Stream::from_subscribe_fn(move |subscriber| {
        let subscriber = Rc::new(RefCell::new(subscriber));
        let counter = Rc::new(Cell::new(0u64));

        let tick_subscriber = Rc::clone(&subscriber);
        let timer = scheduler.schedule_periodic(period, move || {
            let value = counter.get();
            counter.set(value + 1);
            tick_subscriber.borrow_mut().on_item(value);
        });

        match timer {
            Ok(handle) => {
                let subscription = Subscription::new(move || handle.cancel());
                subscriber.borrow_mut().on_subscribe(subscription);
            }
            Err(error) => {
                let mut subscriber = subscriber.borrow_mut();
                subscriber.on_subscribe(Subscription::unattached());
                subscriber.on_error(StreamError::new(error));
            }
        }
    })
}

/// Creates a stream that emits items from `supplier` every `period` clock
/// units on `scheduler`. Never completes; runs until cancelled.
pub fn generate<T, F>(scheduler: &Scheduler, supplier: F, period: u64) -> Stream<T>
where
    T: 'static,
    F: FnMut() -> T + Clone + 'static,
{
    periodic(scheduler, period).map({
        let mut supplier = supplier;
        move |_| supplier()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_periodic_emits_on_schedule() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        periodic(&scheduler, 100).subscribe(subscriber);

        scheduler.advance_to(50);
        assert!(probe.items().is_empty());

        scheduler.advance_to(250);
        assert_eq!(probe.items(), vec![0, 1]);
        assert!(!probe.is_terminated());
    }

    #[test]
    fn test_periodic_cancel_stops_timer() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        periodic(&scheduler, 10).subscribe(subscriber);

        scheduler.advance_to(30);
        assert_eq!(probe.items(), vec![0, 1, 2]);

        probe.cancel();
        scheduler.advance_to(100);
        assert_eq!(probe.item_count(), 3);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_periodic_after_shutdown_errors() {
        let scheduler = Scheduler::new();
        scheduler.shutdown();
        let (subscriber, probe) = TestSubscriber::new();
        periodic(&scheduler, 10).subscribe(subscriber);
        assert!(probe.error().is_some());
        assert!(probe.items().is_empty());
    }

    #[test]
    fn test_generate_maps_the_tick() {
        let scheduler = Scheduler::new();
        let (subscriber, probe) = TestSubscriber::new();
        let mut next = 10;
        generate(
            &scheduler,
            move || {
                next += 10;
                next
            },
            5,
        )
        .subscribe(subscriber);

        scheduler.advance_to(15);
        assert_eq!(probe.items(), vec![20, 30, 40]);
    }
}
