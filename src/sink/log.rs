use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::adapters::cancelled;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Terminal stage that logs every item and drops it.
pub struct LogSink {
    label: &'static str,
}

impl LogSink {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl<T> Pipe<T, ()> for LogSink
where
    T: Debug + Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "log_sink"
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    async fn process(
        &self,
        mut input: Receiver<T>,
        _output: Sender<()>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled("log_sink", "recv");
                    break
                },
                msg = input.recv() => {
                    let Some(item) = msg else { break; };
                    #[cfg(feature = "tracing")]
                    tracing::event!(
                        tracing::Level::INFO,
                        event = "demandpipe.sink.item",
                        label = self.label,
                        item = ?item,
                        "demandpipe.sink.item"
                    );
                }
            }
        }
        Ok(())
    }
}
