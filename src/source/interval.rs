use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::pipeline::adapters::{cancelled, downstream_closed};
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

/// Emits `0, 1, 2, ...`, one tick per `period`, the first after one full
/// period. Never completes on its own.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSource {
    period: Duration,
}

impl IntervalSource {
    /// A zero `period` is raised to one millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }
}

#[async_trait]
impl Pipe<(), u64> for IntervalSource {
    fn stage_name(&self) -> &'static str {
        "interval"
    }

    async fn process(
        &self,
        mut input: Receiver<()>,
        output: Sender<u64>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let stage = self.stage_name();
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = input.recv() => {}
        }

        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled(stage, "tick");
                    break;
                },
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled(stage, "send");
                    break;
                },
                sent = output.send(tick) => {
                    if sent.is_err() {
                        downstream_closed(stage);
                        break;
                    }
                }
            }
            tick += 1;
        }
        Ok(())
    }
}
