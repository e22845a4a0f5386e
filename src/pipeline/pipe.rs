use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;

/// One async stage of a pipeline.
///
/// A stage reads from a bounded `input`, writes to a bounded `output` and
/// returns when its input is exhausted, its output is gone, or `cancel`
/// fires. Sources are stages with `I = ()`: they wait for a single start
/// signal on `input` before producing.
#[async_trait]
pub trait Pipe<I: Send + 'static, O: Send + 'static>: Send + Sync {
    fn stage_name(&self) -> &'static str {
        "anonymous"
    }

    async fn process(
        &self,
        input: Receiver<I>,
        output: Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()>;
}
