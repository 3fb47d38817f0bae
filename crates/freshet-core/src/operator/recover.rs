//! Recovery operators: `on_error_resume_with`, `rescue_then_return`.
//!
//! On an upstream error the subscription is swapped to a replacement
//! stream chosen by user code. The downstream observes a single logical
//! sequence: one `on_subscribe`, the items of the failed upstream followed
//! seamlessly by the replacement's items, and only the final upstream's
//! terminal signal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::stream::{BoxSubscriber, StageLink, Stream, StreamError, Subscriber, Subscription};

struct ResumeShared<T: 'static, F> {
    downstream: RefCell<BoxSubscriber<T>>,
    resume_with: RefCell<F>,
    downstream_subscribed: Cell<bool>,
    link: Rc<StageLink>,
}

struct ResumeWorker<T: 'static, F> {
    shared: Rc<ResumeShared<T, F>>,
}

impl<T, F> Subscriber<T> for ResumeWorker<T, F>
where
    T: 'static,
    F: FnMut(&StreamError) -> Option<Stream<T>> + 'static,
{
    fn on_subscribe(&mut self, subscription: Subscription) {
        self.shared.link.set_upstream(subscription);
        // Only the first upstream's subscription reaches downstream; a
        // replacement attaches silently.
        if !self.shared.downstream_subscribed.get() {
            self.shared.downstream_subscribed.set(true);
            let subscription = self.shared.link.subscription();
            self.shared.downstream.borrow_mut().on_subscribe(subscription);
        }
    }

    fn on_item(&mut self, item: T) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.downstream.borrow_mut().on_item(item);
    }

    fn on_error(&mut self, error: StreamError) {
        if self.shared.link.is_done() {
            return;
        }
        let replacement = (self.shared.resume_with.borrow_mut())(&error);
        match replacement {
            Some(stream) => {
                stream.subscribe(ResumeWorker {
                    shared: Rc::clone(&self.shared),
                });
            }
            None => {
                self.shared.link.mark_done();
                self.shared.downstream.borrow_mut().on_error(error);
            }
        }
    }

    fn on_complete(&mut self) {
        if self.shared.link.is_done() {
            return;
        }
        self.shared.link.mark_done();
        self.shared.downstream.borrow_mut().on_complete();
    }
}

impl<T: 'static> Stream<T> {
    /// On upstream error, swaps the subscription to the stream returned by
    /// `resume_with`. Returning `None` forwards the original error
    /// downstream instead.
    #[must_use]
    pub fn on_error_resume_with<F>(self, resume_with: F) -> Stream<T>
    where
        F: FnMut(&StreamError) -> Option<Stream<T>> + Clone + 'static,
    {
        Stream::from_subscribe_fn(move |downstream| {
            self.subscribe(ResumeWorker {
                shared: Rc::new(ResumeShared {
                    downstream: RefCell::new(downstream),
                    resume_with: RefCell::new(resume_with.clone()),
                    downstream_subscribed: Cell::new(false),
                    link: StageLink::new(),
                }),
            });
        })
    }

    /// On upstream error, emits `value` and completes.
    #[must_use]
    pub fn rescue_then_return(self, value: T) -> Stream<T>
    where
        T: Clone,
    {
        self.on_error_resume_with(move |_| Some(crate::source::of(vec![value.clone()])))
    }
}
