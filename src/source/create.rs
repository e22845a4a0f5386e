use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::{Error, Result};
use crate::pipeline::adapters::{cancelled, downstream_closed};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Handle a [`CreateSource`] producer pushes items through.
pub struct Emitter<T> {
    output: Sender<T>,
    cancel: CancelToken,
}

impl<T: Send> Emitter<T> {
    /// Sends one item, waiting for channel capacity. Fails once downstream
    /// is gone or the pipeline was cancelled; producers should stop then.
    pub async fn next(&self, item: T) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::pipeline("emitter cancelled")),
            sent = self.output.send(item) => {
                sent.map_err(|_| Error::pipeline("emitter downstream closed"))
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.output.is_closed()
    }
}

/// Source driven by a user producer.
///
/// The producer gets an [`Emitter`]; returning `Ok(())` completes the
/// source, returning `Err` fails it with that error.
pub struct CreateSource<F, T> {
    producer: F,
    _t: PhantomData<fn() -> T>,
}

impl<F, T> CreateSource<F, T> {
    pub fn new<Fut>(producer: F) -> Self
    where
        F: Fn(Emitter<T>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        Self {
            producer,
            _t: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> Pipe<(), T> for CreateSource<F, T>
where
    T: Send + 'static,
    F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    fn stage_name(&self) -> &'static str {
        "create"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let stage = self.stage_name();
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        let emitter = Emitter {
            output: output.clone(),
            cancel: cancel.clone(),
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                cancelled(stage, "produce");
                return Ok(());
            },
            res = (self.producer)(emitter) => res,
        };

        match result {
            Ok(()) => Ok(()),
            Err(_) if cancel.is_cancelled() => Ok(()),
            Err(_) if output.is_closed() => {
                downstream_closed(stage);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}
