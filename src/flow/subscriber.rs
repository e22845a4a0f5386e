use std::sync::Arc;

use crate::error::Error;

/// Demand-signalling handle a producer gives its subscriber.
pub trait Subscription: Send + Sync {
    /// Grants `n` more elements. `n == 0` is a protocol violation that the
    /// producer answers with `on_error`. Requesting more than remains is not
    /// an error.
    fn request(&self, n: u64);

    /// Asks the producer to stop. No further signals follow.
    fn cancel(&self);
}

/// Consumer side of the demand protocol.
///
/// Callbacks for one subscription run sequentially and are never
/// re-entered. None of them may block.
pub trait Subscriber<T>: Send {
    /// Called exactly once, before any other signal.
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    /// Called at most as many times as elements were requested.
    fn on_next(&mut self, item: T);

    /// Terminal failure.
    fn on_error(&mut self, error: Error);

    /// Terminal success.
    fn on_complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Unsubscribed,
    AwaitingElements,
    Terminated,
}

/// How a subscription ended.
#[derive(Debug)]
pub enum Termination {
    Completed,
    Failed(Error),
    Cancelled,
}

impl Termination {
    pub fn is_completed(&self) -> bool {
        matches!(self, Termination::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Termination::Failed(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Termination::Failed(error) => Some(error),
            _ => None,
        }
    }
}
