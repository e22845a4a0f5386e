use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::Result;
use crate::pipeline::adapters::downstream_closed;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config;
use crate::pipeline::pipe::Pipe;

/// Pairs every upstream item with the next item of a secondary source.
///
/// The secondary source runs inside this stage under a child token; it is
/// cancelled as soon as either side runs out, so an infinite secondary (an
/// interval, say) never outlives the zip.
pub struct ZipPipe<P, F, U> {
    other: P,
    combine: F,
    _u: PhantomData<fn() -> U>,
}

impl<P, F, U> ZipPipe<P, F, U> {
    pub fn new(other: P, combine: F) -> Self {
        Self {
            other,
            combine,
            _u: PhantomData,
        }
    }
}

#[async_trait]
impl<T, U, R, P, F> Pipe<T, R> for ZipPipe<P, F, U>
where
    T: Send + 'static,
    U: Send + 'static,
    R: Send + 'static,
    P: Pipe<(), U> + Send + Sync,
    F: Fn(T, U) -> R + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "zip_with"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<R>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let stage = self.stage_name();
        let (start_tx, start_rx) = mpsc::channel::<()>(1);
        let (tx_other, mut rx_other) =
            mpsc::channel::<U>(config::buffer_for(self.other.stage_name(), buffer));

        let inner = cancel.child_token();
        // The receiver is still alive and the slot is free, so this cannot fail.
        let _ = start_tx.try_send(());
        drop(start_tx);

        let other = self.other.process(start_rx, tx_other, buffer, inner.clone());

        let outer = cancel.clone();
        let inner_stop = inner.clone();
        let combine = &self.combine;
        let zipping = async move {
            loop {
                let left = tokio::select! {
                    _ = outer.cancelled() => break,
                    msg = input.recv() => match msg {
                        Some(v) => v,
                        None => break,
                    },
                };
                let right = tokio::select! {
                    _ = outer.cancelled() => break,
                    msg = rx_other.recv() => match msg {
                        Some(v) => v,
                        None => break,
                    },
                };
                if output.send(combine(left, right)).await.is_err() {
                    downstream_closed(stage);
                    break;
                }
            }
            inner_stop.cancel();
        };

        let ((), other_res) = tokio::join!(zipping, other);
        other_res
    }
}
