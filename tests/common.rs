#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use demandpipe::error::Result;
use demandpipe::flow::subscriber::Subscription;
use demandpipe::pipeline::cancel::CancelToken;
use demandpipe::pipeline::pipe::Pipe;
use tokio::sync::mpsc::{Receiver, Sender};

pub struct CollectSink<T> {
    out: Arc<Mutex<Vec<T>>>,
}

impl<T> CollectSink<T> {
    pub fn new(out: Arc<Mutex<Vec<T>>>) -> Self {
        Self { out }
    }
}

#[async_trait]
impl<T> Pipe<T, ()> for CollectSink<T>
where
    T: Send + Sync + 'static,
{
    async fn process(
        &self,
        mut input: Receiver<T>,
        _output: Sender<()>,
        _buffer: usize,
        cancel: CancelToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = input.recv() => {
                    let Some(v) = msg else { break; };
                    self.out.lock().expect("mutex poisoned").push(v);
                }
            }
        }
        Ok(())
    }
}

/// Mock producer handle: records every `request(n)` together with how many
/// elements the test had delivered when the request arrived.
#[derive(Clone, Default)]
pub struct RecordingSubscription {
    delivered: Arc<AtomicU64>,
    requests: Arc<Mutex<Vec<(u64, u64)>>>,
    cancels: Arc<AtomicU64>,
}

impl RecordingSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call right before handing an element to the subscriber.
    pub fn mark_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
    }

    /// `(delivered_so_far, n)` per request call, in order.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().expect("mutex poisoned").clone()
    }

    pub fn total_requested(&self) -> u64 {
        self.requests().iter().map(|(_, n)| n).sum()
    }

    pub fn cancels(&self) -> u64 {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl Subscription for RecordingSubscription {
    fn request(&self, n: u64) {
        let delivered = self.delivered.load(Ordering::SeqCst);
        self.requests
            .lock()
            .expect("mutex poisoned")
            .push((delivered, n));
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
