use std::sync::Arc;

use crate::error::Error;
use crate::flow::subscriber::{Subscriber, SubscriberState, Subscription, Termination};

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnMut(&Error) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// Closure-driven subscriber with unbounded demand.
pub struct LambdaSubscriber<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
    state: SubscriberState,
    termination: Option<Termination>,
    subscription: Option<Arc<dyn Subscription>>,
}

impl<T> LambdaSubscriber<T> {
    pub fn new<F>(next: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self {
            next: Box::new(next),
            error: None,
            complete: None,
            state: SubscriberState::Unsubscribed,
            termination: None,
            subscription: None,
        }
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    fn terminate(&mut self, termination: Termination) {
        self.subscription = None;
        self.state = SubscriberState::Terminated;
        self.termination = Some(termination);
    }
}

impl<T: Send> Subscriber<T> for LambdaSubscriber<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.state != SubscriberState::Unsubscribed {
            subscription.cancel();
            return;
        }
        self.state = SubscriberState::AwaitingElements;
        self.subscription = Some(subscription.clone());
        subscription.request(u64::MAX);
    }

    fn on_next(&mut self, item: T) {
        if self.state == SubscriberState::AwaitingElements {
            (self.next)(item);
        }
    }

    fn on_error(&mut self, error: Error) {
        if self.state == SubscriberState::Terminated {
            return;
        }
        match self.error.as_mut() {
            Some(f) => f(&error),
            None => {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "demandpipe.consumer.error",
                    error = %error,
                    "demandpipe.consumer.error"
                );
            }
        }
        self.terminate(Termination::Failed(error));
    }

    fn on_complete(&mut self) {
        if self.state == SubscriberState::Terminated {
            return;
        }
        if let Some(f) = self.complete.as_mut() {
            f();
        }
        self.terminate(Termination::Completed);
    }
}
