use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::flow::delivery;
use crate::flow::subscriber::Subscriber;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config::{StageConfig, STAGE_CONFIG};
use crate::pipeline::pipe::Pipe;

/// Spawns pipelines and subscriptions onto the ambient Tokio runtime.
pub struct Runtime {
    buffer: usize,
    buffers: HashMap<&'static str, usize>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            buffer: 128,
            buffers: HashMap::new(),
        }
    }

    /// Capacity of every channel between stages. Clamped to at least 1.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Capacity of the channel feeding the stage called `stage`, overriding
    /// the global buffer for that stage only.
    pub fn buffer_stage(mut self, stage: &'static str, buffer: usize) -> Self {
        self.buffers.insert(stage, buffer.max(1));
        self
    }

    pub fn spawn<I, O, P>(
        &self,
        pipe: P,
    ) -> (
        mpsc::Sender<I>,
        mpsc::Receiver<O>,
        CancelToken,
        JoinHandle<Result<()>>,
    )
    where
        I: Send + 'static,
        O: Send + 'static,
        P: Pipe<I, O> + Send + Sync + 'static,
    {
        let (tx_in, rx_in) = mpsc::channel::<I>(self.buffer);
        let (tx_out, rx_out) = mpsc::channel::<O>(self.buffer);

        let buffer = self.buffer;
        let cancel = CancelToken::default();
        let cancel_task = cancel.clone();

        let stage = pipe.stage_name();
        let handle = self.spawn_scoped(stage, async move {
            pipe.process(rx_in, tx_out, buffer, cancel_task).await
        });

        (tx_in, rx_out, cancel, handle)
    }

    /// Like [`Runtime::spawn`] for pipelines ending in a sink: the `()`
    /// output is drained internally so awaiting the handle is enough.
    pub fn spawn_sink<I, P>(&self, pipe: P) -> (mpsc::Sender<I>, CancelToken, JoinHandle<Result<()>>)
    where
        I: Send + 'static,
        P: Pipe<I, ()> + Send + Sync + 'static,
    {
        let (tx_in, rx_in) = mpsc::channel::<I>(self.buffer);
        let (tx_out, mut rx_out) = mpsc::channel::<()>(self.buffer);

        let buffer = self.buffer;
        let cancel = CancelToken::default();
        let cancel_task = cancel.clone();

        let stage = pipe.stage_name();
        let handle = self.spawn_scoped(stage, async move {
            let drain = async move { while rx_out.recv().await.is_some() {} };
            let (res, ()) = tokio::join!(pipe.process(rx_in, tx_out, buffer, cancel_task), drain);
            res
        });

        (tx_in, cancel, handle)
    }

    /// Subscribes `subscriber` to `source` and starts it.
    ///
    /// The subscriber receives `on_subscribe` before any element and sees
    /// elements only against the demand it requested. Upstream failures are
    /// delivered through `on_error` and do not fail the handle; the handle
    /// yields the subscriber back once the subscription terminates or is
    /// cancelled.
    pub fn subscribe<T, P, S>(&self, source: P, subscriber: S) -> (CancelToken, JoinHandle<Result<S>>)
    where
        T: Send + 'static,
        P: Pipe<(), T> + Send + Sync + 'static,
        S: Subscriber<T> + Send + 'static,
    {
        let buffer = self.buffer;
        let cancel = CancelToken::default();
        let cancel_task = cancel.clone();

        let stage = source.stage_name();
        let handle = self.spawn_scoped(stage, async move {
            delivery::run(source, subscriber, buffer, cancel_task).await
        });

        (cancel, handle)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn spawn_scoped<F, R>(&self, stage: &'static str, fut: F) -> JoinHandle<R>
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let config = StageConfig {
            buffers: Arc::new(self.buffers.clone()),
        };
        let scoped = STAGE_CONFIG.scope(config, fut);

        #[cfg(feature = "tracing")]
        {
            use tracing::Instrument;
            let span = tracing::info_span!("demandpipe.stage", stage = stage, buffer = self.buffer);
            tokio::spawn(scoped.instrument(span))
        }

        #[cfg(not(feature = "tracing"))]
        tokio::spawn(scoped)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
