use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::error::Result;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::pipe::Pipe;

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn downstream_closed(stage: &'static str) {
    #[cfg(feature = "tracing")]
    tracing::event!(
        tracing::Level::INFO,
        event = "demandpipe.downstream.closed",
        stage = stage,
        "demandpipe.downstream.closed"
    );
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn cancelled(stage: &'static str, where_: &'static str) {
    #[cfg(feature = "tracing")]
    tracing::event!(
        tracing::Level::DEBUG,
        event = "demandpipe.cancelled",
        stage = stage,
        where_ = where_,
        "demandpipe.cancelled"
    );
}

/// map: O -> N
pub struct MapPipe<F>(pub F);

#[async_trait]
impl<I, N, F> Pipe<I, N> for MapPipe<F>
where
    I: Send + 'static,
    N: Send + 'static,
    F: Fn(I) -> N + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "map"
    }

    async fn process(
        &self,
        mut input: Receiver<I>,
        output: Sender<N>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    if output.send((self.0)(v)).await.is_err() {
                        downstream_closed("map");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct FilterPipe<P>(pub P);

#[async_trait]
impl<T, P> Pipe<T, T> for FilterPipe<P>
where
    T: Send + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "filter"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    if (self.0)(&v) && output.send(v).await.is_err() {
                        downstream_closed("filter");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct InspectPipe<F>(pub F);

#[async_trait]
impl<T, F> Pipe<T, T> for InspectPipe<F>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "inspect"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    (self.0)(&v);
                    if output.send(v).await.is_err() {
                        downstream_closed("inspect");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// flat_map: O -> zero or more N, emitted in order.
pub struct FlatMapPipe<F>(pub F);

#[async_trait]
impl<I, N, It, F> Pipe<I, N> for FlatMapPipe<F>
where
    I: Send + 'static,
    N: Send + 'static,
    It: IntoIterator<Item = N>,
    It::IntoIter: Send,
    F: Fn(I) -> It + Send + Sync + 'static,
{
    fn stage_name(&self) -> &'static str {
        "flat_map"
    }

    async fn process(
        &self,
        mut input: Receiver<I>,
        output: Sender<N>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    for inner in (self.0)(v) {
                        if output.send(inner).await.is_err() {
                            downstream_closed("flat_map");
                            return Ok(());
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Forwards the first `n` items, then drops its input so upstream stops.
pub struct TakePipe(pub usize);

#[async_trait]
impl<T> Pipe<T, T> for TakePipe
where
    T: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "take"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let mut remaining = self.0;
        while remaining > 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    remaining -= 1;
                    if output.send(v).await.is_err() {
                        downstream_closed("take");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Buffers every item and emits them as one `Vec` once upstream completes.
/// Nothing is emitted when cancelled.
pub struct CollectListPipe;

#[async_trait]
impl<T> Pipe<T, Vec<T>> for CollectListPipe
where
    T: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "collect_list"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<Vec<T>>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let mut items = Vec::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled("collect_list", "recv");
                    return Ok(());
                },
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    items.push(v);
                }
            }
        }
        if output.send(items).await.is_err() {
            downstream_closed("collect_list");
        }
        Ok(())
    }
}

/// Waits `period` before forwarding each item.
pub struct DelayPipe(pub Duration);

#[async_trait]
impl<T> Pipe<T, T> for DelayPipe
where
    T: Send + 'static,
{
    fn stage_name(&self) -> &'static str {
        "delay_elements"
    }

    async fn process(
        &self,
        mut input: Receiver<T>,
        output: Sender<T>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            cancelled("delay_elements", "delay");
                            break;
                        },
                        _ = tokio::time::sleep(self.0) => {}
                    }
                    if output.send(v).await.is_err() {
                        downstream_closed("delay_elements");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
