use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::pipeline::adapters::cancelled;
use crate::pipeline::cancel::CancelToken;

type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Bounded retry with exponential backoff.
///
/// Drives `.retry(..)`, which re-runs a whole source. Nothing is retried
/// until `retry_if(...)` says the error is retryable;
/// [`RetryPolicy::retries`] is the shorthand for "retry anything, right
/// away".
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Option<Duration>,
    retry_if: RetryPredicate,
}

impl RetryPolicy {
    /// `max_attempts` counts the first run and is clamped to at least 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(5),
            jitter: None,
            retry_if: Arc::new(|_| false),
        }
    }

    /// Re-runs after any error, `retries` more times, without waiting.
    pub fn retries(retries: u32) -> Self {
        Self::new(retries.saturating_add(1))
            .base_delay(Duration::ZERO)
            .retry_if(|_| true)
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.jitter = Some(max_jitter);
        self
    }

    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, error: &Error) -> bool {
        (self.retry_if)(error)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `base_delay * 2^(attempt - 1)` plus jitter, capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        let exponential = self.base_delay.saturating_mul(1u32 << doublings);

        let jitter = self
            .jitter
            .map_or(Duration::ZERO, |max| jitter_for(max, attempt));

        exponential.saturating_add(jitter).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

/// Same attempt, same jitter: backoff stays reproducible under a paused
/// clock. splitmix64 finaliser over the attempt number.
fn jitter_for(max_jitter: Duration, attempt: u32) -> Duration {
    let bound = u64::try_from(max_jitter.as_nanos()).unwrap_or(u64::MAX);
    if bound == 0 {
        return Duration::ZERO;
    }

    let mut z = u64::from(attempt).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;

    Duration::from_nanos(z % bound.saturating_add(1))
}

/// Sleeps for `policy`'s backoff after failed attempt `attempt`. Returns
/// `false` when cancelled mid-sleep.
pub(crate) async fn backoff(
    stage: &'static str,
    policy: &RetryPolicy,
    attempt: u32,
    cancel: &CancelToken,
) -> bool {
    let delay = policy.backoff_delay(attempt);
    if delay.is_zero() {
        return true;
    }

    #[cfg(feature = "tracing")]
    tracing::event!(
        tracing::Level::WARN,
        event = "demandpipe.retry.sleep",
        stage = stage,
        attempt = attempt,
        delay_ms = delay.as_millis() as u64,
        "demandpipe.retry.sleep"
    );

    tokio::select! {
        _ = cancel.cancelled() => {
            cancelled(stage, "backoff");
            false
        },
        _ = tokio::time::sleep(delay) => true,
    }
}
