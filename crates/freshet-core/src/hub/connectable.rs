//! Connectable streams and reference counting.
//!
//! A [`Connectable`] pairs a source stream with a hub: downstream
//! subscribers attach to the hub freely, but the hub only subscribes to
//! the source when [`Connectable::connect`] is called. `ref_count` derives
//! a stream that connects on the first downstream subscriber and
//! disconnects when the last one leaves, so no upstream subscription
//! exists while the downstream count is zero.

use std::cell::RefCell;
use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

use super::Hub;

/// Errors from hub and connectable-stream operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// `connect` was called while a connection is live.
    #[error("connectable stream is already connected")]
    AlreadyConnected,
}

struct ConnectableInner<T: Clone + 'static> {
    source: Stream<T>,
    hub: Hub<T>,
    connection: RefCell<Option<Subscription>>,
}

/// A stream whose upstream subscription is explicit via
/// [`connect`](Connectable::connect).
pub struct Connectable<T: Clone + 'static> {
    inner: Rc<ConnectableInner<T>>,
}

impl<T: Clone + 'static> Clone for Connectable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Connectable<T> {
    pub(crate) fn new(source: Stream<T>, hub: Hub<T>) -> Self {
        Self {
            inner: Rc::new(ConnectableInner {
                source,
                hub,
                connection: RefCell::new(None),
            }),
        }
    }

    /// Subscribes the hub to the source.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AlreadyConnected`] while a connection is live.
    pub fn connect(&self) -> Result<(), HubError> {
        {
            let connection = self.inner.connection.borrow();
            if connection.as_ref().is_some_and(|c| !c.is_cancelled()) {
                return Err(HubError::AlreadyConnected);
            }
        }
        let capture = Rc::new(RefCell::new(None));
        self.inner
            .source
            .subscribe(self.inner.hub.forwarder(Rc::clone(&capture)));
        *self.inner.connection.borrow_mut() = capture.borrow_mut().take();
        Ok(())
    }

    /// Cancels the hub's subscription to the source. A no-op when not
    /// connected.
    pub fn disconnect(&self) {
        let connection = self.inner.connection.borrow_mut().take();
        if let Some(subscription) = connection {
            subscription.cancel();
        }
    }

    /// Returns true while a connection is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .borrow()
            .as_ref()
            .is_some_and(|c| !c.is_cancelled())
    }

    /// Returns the hub backing this connectable.
    #[must_use]
    pub fn hub(&self) -> &Hub<T> {
        &self.inner.hub
    }

    /// Returns the hub's stream view: subscribing does not connect.
    #[must_use]
    pub fn stream(&self) -> Stream<T> {
        self.inner.hub.stream()
    }

    /// Returns a stream that connects on the first downstream subscriber
    /// and disconnects when the last one leaves.
    #[must_use]
    pub fn ref_count(&self) -> Stream<T> {
        let connectable = self.clone();
        Stream::from_subscribe_fn(move |downstream| {
            let needs_connect = !connectable.hub().has_subscribers();
            connectable.stream().subscribe(RefCountWorker {
                downstream,
                connectable: connectable.clone(),
                link: StageLink::new(),
            });
            if needs_connect {
                let _ = connectable.connect();
            }
        })
    }
}

struct RefCountWorker<T: Clone + 'static> {
    downstream: BoxSubscriber<T>,
    connectable: Connectable<T>,
    link: Rc<StageLink>,
}

impl<T: Clone + 'static> RefCountWorker<T> {
    fn disconnect_if_idle(&self) {
        if !self.connectable.hub().has_subscribers() {
            self.connectable.disconnect();
        }
    }
}

impl<T: Clone + 'static> Subscriber<T> for RefCountWorker<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.link.set_upstream(subscription);
        let link = Rc::clone(&self.link);
        let connectable = self.connectable.clone();
        self.downstream.on_subscribe(Subscription::new(move || {
            link.cancel_upstream();
            if !connectable.hub().has_subscribers() {
                connectable.disconnect();
            }
        }));
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
        self.disconnect_if_idle();
    }

    fn on_complete(&mut self) {
        if self.link.is_done() {
            return;
        }
        self.link.mark_done();
        self.downstream.on_complete();
        self.disconnect_if_idle();
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Wraps this stream in a [`Connectable`] backed by a plain subject.
    #[must_use]
    pub fn publish(self) -> Connectable<T> {
        Connectable::new(self, Hub::subject())
    }

    /// Wraps this stream in a [`Connectable`] backed by a replay hub.
    #[must_use]
    pub fn publish_replay(self, capacity: usize) -> Connectable<T> {
        Connectable::new(self, Hub::replay(capacity))
    }

    /// Multicasts this stream with reference counting: one upstream
    /// subscription shared by all downstream subscribers, held only while
    /// at least one is attached.
    #[must_use]
    pub fn share(self) -> Stream<T> {
        self.publish().ref_count()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::scheduler::Scheduler;
    use crate::source;
    use crate::testing::TestSubscriber;

    #[test]
    fn test_connect_is_explicit() {
        let subscriptions = Rc::new(Cell::new(0));
        let count = Rc::clone(&subscriptions);
        let upstream = Stream::from_subscribe_fn(move |subscriber| {
            count.set(count.get() + 1);
            source::of(vec![1, 2]).subscribe(subscriber);
        });

        let connectable = upstream.publish();
        let (subscriber, probe) = TestSubscriber::new();
        connectable.stream().subscribe(subscriber);
        assert_eq!(subscriptions.get(), 0);
        assert!(probe.items().is_empty());

        connectable.connect().unwrap();
        assert_eq!(subscriptions.get(), 1);
        assert_eq!(probe.items(), vec![1, 2]);
        assert!(probe.is_completed());
    }

    #[test]
    fn test_connect_twice_errors() {
        let scheduler = Scheduler::new();
        let connectable = source::periodic(&scheduler, 10).publish();
        connectable.connect().unwrap();
        assert!(matches!(
            connectable.connect(),
            Err(HubError::AlreadyConnected)
        ));
        connectable.disconnect();
        assert!(!connectable.is_connected());
        // Reconnecting after a disconnect is allowed.
        connectable.connect().unwrap();
    }

    #[test]
    fn test_disconnect_cancels_upstream() {
        let scheduler = Scheduler::new();
        let connectable = source::periodic(&scheduler, 10).publish();
        let (subscriber, probe) = TestSubscriber::new();
        connectable.stream().subscribe(subscriber);
        connectable.connect().unwrap();

        scheduler.advance_to(20);
        assert_eq!(probe.items(), vec![0, 1]);

        connectable.disconnect();
        scheduler.advance_to(100);
        assert_eq!(probe.item_count(), 2);
    }

    #[test]
    fn test_ref_count_connects_on_first_and_disconnects_on_last() {
        let scheduler = Scheduler::new();
        let connectable = source::periodic(&scheduler, 10).publish();
        let shared = connectable.ref_count();

        assert!(!connectable.is_connected());

        let (first, first_probe) = TestSubscriber::new();
        shared.subscribe(first);
        assert!(connectable.is_connected());

        let (second, second_probe) = TestSubscriber::new();
        shared.subscribe(second);
        scheduler.advance_to(10);
        assert_eq!(first_probe.items(), vec![0]);
        assert_eq!(second_probe.items(), vec![0]);

        first_probe.cancel();
        assert!(connectable.is_connected());
        second_probe.cancel();
        // No upstream subscription survives a zero downstream count.
        assert!(!connectable.is_connected());
    }

    #[test]
    fn test_share_single_upstream_subscription() {
        let subscriptions = Rc::new(Cell::new(0));
        let count = Rc::clone(&subscriptions);
        let scheduler = Scheduler::new();
        let ticker = source::periodic(&scheduler, 10);
        let upstream = Stream::from_subscribe_fn(move |subscriber| {
            count.set(count.get() + 1);
            ticker.clone().subscribe(subscriber);
        });

        let shared = upstream.share();
        let (first, first_probe) = TestSubscriber::new();
        let (second, second_probe) = TestSubscriber::new();
        shared.subscribe(first);
        shared.subscribe(second);

        scheduler.advance_to(20);
        assert_eq!(subscriptions.get(), 1);
        assert_eq!(first_probe.items(), vec![0, 1]);
        assert_eq!(second_probe.items(), vec![0, 1]);
    }
}
