use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::adapters::{cancelled, downstream_closed};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Emits a fixed list of items, in order, once per start signal.
#[derive(Clone)]
pub struct IterSource<T> {
    items: Vec<T>,
}

impl<T> IterSource<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<T> Pipe<(), T> for IterSource<T>
where
    T: Send + Sync + Clone + 'static,
{
    fn stage_name(&self) -> &'static str {
        "iter"
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

        for item in self.items.iter().cloned() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled(stage, "send");
                    break;
                },
                sent = output.send(item) => {
                    if sent.is_err() {
                        downstream_closed(stage);
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
