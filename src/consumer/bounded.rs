//! Batch-paced consumer: request `L`, consume `L`, request `L` again.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Error;
use crate::flow::subscriber::{Subscriber, SubscriberState, Subscription, Termination};

type Observer<T> = Box<dyn FnMut(&T) + Send>;

/// Consumes a sequence without ever holding more than `limit` elements of
/// outstanding demand, replenishing in batches of `limit`.
///
/// The first `request(limit)` is issued from `on_subscribe`. Every delivered
/// element bumps the consumed count; when it reaches `limit` the count resets
/// to zero and another `request(limit)` goes upstream. A final partial batch
/// triggers nothing.
pub struct BoundedDemandSubscriber<T> {
    limit: u64,
    consumed: u64,
    received: u64,
    dropped: u64,
    cancel_after: Option<u64>,
    state: SubscriberState,
    termination: Option<Termination>,
    subscription: Option<Arc<dyn Subscription>>,
    observer: Option<Observer<T>>,
}

impl<T> BoundedDemandSubscriber<T> {
    /// `limit` is clamped to at least 1.
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            consumed: 0,
            received: 0,
            dropped: 0,
            cancel_after: None,
            state: SubscriberState::Unsubscribed,
            termination: None,
            subscription: None,
            observer: None,
        }
    }

    /// Called with every processed element, after it is logged.
    pub fn on_value<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Cancels the subscription once `count` elements were processed.
    pub fn cancel_after(mut self, count: u64) -> Self {
        self.cancel_after = Some(count);
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Elements consumed since the last replenishment.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Elements processed over the whole subscription.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Elements delivered outside `AwaitingElements` and ignored.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Requested elements not yet consumed.
    pub fn in_flight(&self) -> u64 {
        match self.state {
            SubscriberState::AwaitingElements => self.limit - self.consumed,
            _ => 0,
        }
    }

    /// Stops consuming early and tells upstream to release its resources.
    pub fn cancel(&mut self) {
        if self.state == SubscriberState::Terminated {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.terminate(Termination::Cancelled);
    }

    fn terminate(&mut self, termination: Termination) {
        self.subscription = None;
        self.consumed = 0;
        self.state = SubscriberState::Terminated;
        self.termination = Some(termination);
    }
}

impl<T> Default for BoundedDemandSubscriber<T> {
    fn default() -> Self {
        Self::new(5)
    }
}

impl<T> Subscriber<T> for BoundedDemandSubscriber<T>
where
    T: Debug + Send,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.state != SubscriberState::Unsubscribed {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "demandpipe.protocol.violation",
                rule = "on_subscribe called twice",
                state = ?self.state,
                "demandpipe.protocol.violation"
            );
            subscription.cancel();
            return;
        }

        self.state = SubscriberState::AwaitingElements;
        self.subscription = Some(subscription.clone());

        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::DEBUG,
            event = "demandpipe.consumer.subscribed",
            limit = self.limit,
            "demandpipe.consumer.subscribed"
        );
        subscription.request(self.limit);
    }

    fn on_next(&mut self, item: T) {
        if self.state != SubscriberState::AwaitingElements {
            self.dropped += 1;
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::DEBUG,
                event = "demandpipe.consumer.dropped",
                state = ?self.state,
                item = ?item,
                "demandpipe.consumer.dropped"
            );
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::INFO,
            event = "demandpipe.consumer.next",
            value = ?item,
            "demandpipe.consumer.next"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer(&item);
        }
        self.received += 1;
        self.consumed += 1;

        if self.cancel_after.is_some_and(|count| self.received >= count) {
            self.cancel();
            return;
        }

        if self.consumed == self.limit {
            self.consumed = 0;
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::DEBUG,
                event = "demandpipe.consumer.replenish",
                limit = self.limit,
                received = self.received,
                "demandpipe.consumer.replenish"
            );
            if let Some(subscription) = &self.subscription {
                subscription.request(self.limit);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.state == SubscriberState::Terminated {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::ERROR,
            event = "demandpipe.consumer.error",
            received = self.received,
            error = %error,
            "demandpipe.consumer.error"
        );
        self.terminate(Termination::Failed(error));
    }

    fn on_complete(&mut self) {
        if self.state == SubscriberState::Terminated {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::event!(
            tracing::Level::INFO,
            event = "demandpipe.consumer.complete",
            received = self.received,
            "demandpipe.consumer.complete"
        );
        self.terminate(Termination::Completed);
    }
}
