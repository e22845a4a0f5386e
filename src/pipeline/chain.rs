use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::pipeline::adapters::{
    CollectListPipe, DelayPipe, FilterPipe, FlatMapPipe, InspectPipe, MapPipe, TakePipe,
};
use crate::pipeline::adapters_try::TryMapPipe;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config;
use crate::pipeline::pipe::Pipe;
use crate::pipeline::resubscribe::Resubscribe;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::zip::ZipPipe;

pub struct Chain<A, B, M> {
    a: A,
    b: B,
    _m: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    pub fn new(a: A, b: B) -> Self {
        Self {
            a,
            b,
            _m: PhantomData,
        }
    }
}

#[async_trait]
impl<I, M, O, A, B> Pipe<I, O> for Chain<A, B, M>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
    A: Pipe<I, M> + Send + Sync,
    B: Pipe<M, O> + Send + Sync,
{
    fn stage_name(&self) -> &'static str {
        self.b.stage_name()
    }

    async fn process(
        &self,
        input: mpsc::Receiver<I>,
        output: mpsc::Sender<O>,
        buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        let (tx_mid, rx_mid) = mpsc::channel::<M>(config::buffer_for(self.b.stage_name(), buffer));

        let left = self.a.process(input, tx_mid, buffer, cancel.clone());
        let right = self.b.process(rx_mid, output, buffer, cancel.clone());

        tokio::pin!(left);
        tokio::pin!(right);

        let mut left_res: Option<Result<()>> = None;
        let mut right_res: Option<Result<()>> = None;

        while left_res.is_none() || right_res.is_none() {
            tokio::select! {
                res = &mut left, if left_res.is_none() => {
                    if res.is_err() {
                        cancel.cancel();
                    }
                    left_res = Some(res);
                }
                res = &mut right, if right_res.is_none() => {
                    if res.is_err() {
                        cancel.cancel();
                    }
                    right_res = Some(res);
                }
            }
        }

        match (left_res, right_res) {
            (Some(left), Some(right)) => {
                left?;
                right
            }
            _ => Err(Error::pipeline("chain stage did not finish")),
        }
    }
}

pub trait PipeExt<I, O>: Pipe<I, O> + Sized
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn pipe<N, P2>(self, next: P2) -> Chain<Self, P2, O>
    where
        N: Send + 'static,
        P2: Pipe<O, N> + Send + Sync,
        Self: Send + Sync,
    {
        Chain::new(self, next)
    }

    fn map<N, F>(self, f: F) -> Chain<Self, MapPipe<F>, O>
    where
        N: Send + 'static,
        F: Fn(O) -> N + Send + Sync + 'static,
        Self: Send + Sync,
    {
        Chain::new(self, MapPipe(f))
    }

    fn filter<F>(self, pred: F) -> Chain<Self, FilterPipe<F>, O>
    where
        F: Fn(&O) -> bool + Send + Sync + 'static,
        Self: Send + Sync,
    {
        Chain::new(self, FilterPipe(pred))
    }

    fn inspect<F>(self, f: F) -> Chain<Self, InspectPipe<F>, O>
    where
        F: Fn(&O) + Send + Sync + 'static,
        Self: Send + Sync,
    {
        Chain::new(self, InspectPipe(f))
    }

    /// Emits every element of `f(item)` in order. Returning `None` or an
    /// empty collection drops the item.
    fn flat_map<N, It, F>(self, f: F) -> Chain<Self, FlatMapPipe<F>, O>
    where
        N: Send + 'static,
        It: IntoIterator<Item = N>,
        It::IntoIter: Send,
        F: Fn(O) -> It + Send + Sync + 'static,
        Self: Send + Sync,
    {
        Chain::new(self, FlatMapPipe(f))
    }

    fn take(self, n: usize) -> Chain<Self, TakePipe, O>
    where
        Self: Send + Sync,
    {
        Chain::new(self, TakePipe(n))
    }

    fn collect_list(self) -> Chain<Self, CollectListPipe, O>
    where
        Self: Send + Sync,
    {
        Chain::new(self, CollectListPipe)
    }

    fn delay_elements(self, period: Duration) -> Chain<Self, DelayPipe, O>
    where
        Self: Send + Sync,
    {
        Chain::new(self, DelayPipe(period))
    }

    /// Pairs each item with the next item of `other`; stops when either
    /// side runs out.
    fn zip_with<U, R, P2, F>(self, other: P2, combine: F) -> Chain<Self, ZipPipe<P2, F, U>, O>
    where
        U: Send + 'static,
        R: Send + 'static,
        P2: Pipe<(), U> + Send + Sync,
        F: Fn(O, U) -> R + Send + Sync + 'static,
        Self: Send + Sync,
    {
        Chain::new(self, ZipPipe::new(other, combine))
    }

    fn try_map<N, F, Fut>(self, stage: &'static str, f: F) -> Chain<Self, TryMapPipe<F>, O>
    where
        N: Send + 'static,
        F: Fn(O) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<N>> + Send,
        Self: Send + Sync,
    {
        Chain::new(self, TryMapPipe::new(stage, f))
    }

    /// Re-runs this whole source when it fails, bounded by `policy`.
    fn retry(self, policy: RetryPolicy) -> Resubscribe<Self>
    where
        Self: Pipe<(), O> + Send + Sync,
    {
        Resubscribe::new(self, policy)
    }
}

impl<I, O, P> PipeExt<I, O> for P
where
    I: Send + 'static,
    O: Send + 'static,
    P: Pipe<I, O> + Sized + Send + Sync,
{
}
