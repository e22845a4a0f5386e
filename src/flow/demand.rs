use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::flow::subscriber::Subscription;
use crate::pipeline::cancel::CancelToken;

/// Credit a subscriber has granted and the delivery loop draws from.
///
/// `u64::MAX` outstanding credit means unbounded: it is never drawn down.
#[derive(Clone)]
pub struct Demand {
    inner: Arc<Inner>,
    cancel: CancelToken,
}

#[derive(Default)]
struct Inner {
    credit: AtomicU64,
    requested: AtomicU64,
    requests: AtomicU64,
    violated: AtomicBool,
    notify: Notify,
}

impl Demand {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            cancel,
        }
    }

    /// Credit granted but not yet used.
    pub fn outstanding(&self) -> u64 {
        self.inner.credit.load(Ordering::SeqCst)
    }

    /// Sum of every `request(n)`, saturating.
    pub fn total_requested(&self) -> u64 {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Number of valid `request` calls.
    pub fn request_calls(&self) -> u64 {
        self.inner.requests.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a `request(0)` was seen.
    pub fn is_violated(&self) -> bool {
        self.inner.violated.load(Ordering::SeqCst)
    }

    /// Draws one unit of credit. Returns `false` when none is outstanding.
    pub fn try_acquire(&self) -> bool {
        self.inner
            .credit
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |credit| match credit {
                0 => None,
                u64::MAX => Some(u64::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }

    /// Resolves once credit is outstanding or a violation was recorded.
    pub async fn granted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() > 0 || self.is_violated() {
                return;
            }
            notified.await;
        }
    }

    /// Resolves once a `request(0)` was recorded, whatever the credit.
    pub async fn violated(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_violated() {
                return;
            }
            notified.await;
        }
    }
}

impl Subscription for Demand {
    fn request(&self, n: u64) {
        if n == 0 {
            self.inner.violated.store(true, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
            return;
        }

        let add = |current: u64| Some(current.saturating_add(n));
        // fetch_update with a closure that always returns Some cannot fail.
        let _ = self
            .inner
            .credit
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, add);
        let _ = self
            .inner
            .requested
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, add);
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
