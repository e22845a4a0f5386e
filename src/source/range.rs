use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::adapters::{cancelled, downstream_closed};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Emits `count` consecutive integers starting at `start`.
#[derive(Debug, Clone, Copy)]
pub struct RangeSource {
    start: i64,
    count: u64,
}

impl RangeSource {
    pub fn new(start: i64, count: u64) -> Self {
        Self { start, count }
    }
}

#[async_trait]
impl Pipe<(), i64> for RangeSource {
    fn stage_name(&self) -> &'static str {
        "range"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<i64>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let stage = self.stage_name();
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        let mut value = self.start;
        for _ in 0..self.count {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled(stage, "send");
                    break;
                },
                sent = output.send(value) => {
                    if sent.is_err() {
                        downstream_closed(stage);
                        break;
                    }
                }
            }
            value = value.wrapping_add(1);
        }
        Ok(())
    }
}
