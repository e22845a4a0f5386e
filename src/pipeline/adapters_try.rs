use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::adapters::{cancelled, downstream_closed};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Async fallible map.
///
/// The first `Err` fails the stage, attributed to `stage`; items after it
/// are never mapped. Recovery belongs upstream: wrap the source with
/// `.retry(policy)` to run it again.
pub struct TryMapPipe<F> {
    stage: &'static str,
    f: F,
}

impl<F> TryMapPipe<F> {
    pub fn new(stage: &'static str, f: F) -> Self {
        Self { stage, f }
    }
}

#[async_trait]
impl<I, O, F, Fut> Pipe<I, O> for TryMapPipe<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send,
{
    fn stage_name(&self) -> &'static str {
        self.stage
    }

    async fn process(
        &self,
        mut input: Receiver<I>,
        output: Sender<O>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled(self.stage, "recv");
                    break;
                },
                msg = input.recv() => match msg {
                    Some(item) => item,
                    None => break,
                },
            };

            let value = match (self.f)(item).await {
                Ok(value) => value,
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(
                        tracing::Level::WARN,
                        event = "demandpipe.try_map.failed",
                        stage = self.stage,
                        error = %error,
                        "demandpipe.try_map.failed"
                    );
                    return Err(Error::stage_source(self.stage, error));
                }
            };

            if output.send(value).await.is_err() {
                downstream_closed(self.stage);
                break;
            }
        }
        Ok(())
    }
}
