use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::adapters::cancelled;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;
use crate::pipeline::retry::{backoff, RetryPolicy};

/// Re-runs a whole source from scratch when it fails.
///
/// Items emitted by a failed attempt stay emitted; downstream sees the
/// prefix again on every new attempt.
pub struct Resubscribe<P> {
    source: P,
    policy: RetryPolicy,
}

impl<P> Resubscribe<P> {
    pub fn new(source: P, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }
}

#[async_trait]
impl<O, P> Pipe<(), O> for Resubscribe<P>
where
    O: Send + 'static,
    P: Pipe<(), O> + Send + Sync,
{
    fn stage_name(&self) -> &'static str {
        self.source.stage_name()
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let stage = self.stage_name();
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1u32;

        loop {
            let (start_tx, start_rx) = mpsc::channel::<()>(1);
            // Fresh receiver with a free slot, so this cannot fail.
            let _ = start_tx.try_send(());
            drop(start_tx);

            // A failing chain cancels the token it was given, so each attempt
            // gets a child: the outer token still reaches it, its failure
            // does not reach the outer token.
            let attempt_cancel = cancel.child_token();
            let result = self
                .source
                .process(start_rx, output.clone(), buffer, attempt_cancel)
                .await;

            let error = match result {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };

            if cancel.is_cancelled() || output.is_closed() {
                cancelled(stage, "resubscribe");
                return Ok(());
            }

            if !self.policy.is_retryable(&error) {
                return Err(error);
            }

            if attempt >= max_attempts {
                #[cfg(feature = "tracing")]
                tracing::event!(
                    tracing::Level::ERROR,
                    event = "demandpipe.retry.exhausted",
                    stage = stage,
                    attempts = max_attempts,
                    error = %error,
                    "demandpipe.retry.exhausted"
                );
                return Err(Error::retry_exhausted(stage, max_attempts, error));
            }

            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "demandpipe.retry.resubscribe",
                stage = stage,
                attempt = attempt,
                max_attempts = max_attempts,
                error = %error,
                "demandpipe.retry.resubscribe"
            );

            if !backoff(stage, &self.policy, attempt, &cancel).await {
                return Ok(());
            }
            attempt += 1;
        }
    }
}
