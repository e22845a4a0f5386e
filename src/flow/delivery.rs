use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::flow::demand::Demand;
use crate::flow::subscriber::{Subscriber, Subscription};
use crate::pipeline::adapters::cancelled;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::config;
use crate::pipeline::pipe::Pipe;

const STAGE: &str = "subscriber";

/// Runs `source` and feeds `subscriber` on the current task until the
/// subscription terminates or `cancel` fires.
///
/// The source runs under a child token so that a failing chain (which
/// cancels its token) still reaches the subscriber as `on_error` instead of
/// looking like a cancellation of the subscription.
pub(crate) async fn run<T, P, S>(
    source: P,
    mut subscriber: S,
    buffer: usize,
    cancel: CancelToken,
) -> Result<S>
where
    T: Send + 'static,
    P: Pipe<(), T> + Send + Sync,
    S: Subscriber<T>,
{
    let (start_tx, start_rx) = mpsc::channel::<()>(1);
    let _ = start_tx.try_send(());
    drop(start_tx);

    let (tx, rx) = mpsc::channel::<T>(config::buffer_for(STAGE, buffer));
    let (outcome_tx, outcome_rx) = oneshot::channel::<Result<()>>();
    let upstream_cancel = cancel.child_token();

    let upstream = {
        let upstream_cancel = upstream_cancel.clone();
        let source = &source;
        async move {
            let res = source.process(start_rx, tx, buffer, upstream_cancel).await;
            let _ = outcome_tx.send(res);
        }
    };

    let downstream = async {
        deliver(rx, outcome_rx, &mut subscriber, &cancel).await;
        upstream_cancel.cancel();
    };

    tokio::join!(upstream, downstream);
    Ok(subscriber)
}

async fn deliver<T, S>(
    mut input: mpsc::Receiver<T>,
    outcome: oneshot::Receiver<Result<()>>,
    subscriber: &mut S,
    cancel: &CancelToken,
) where
    S: Subscriber<T>,
{
    let demand = Demand::new(cancel.clone());
    subscriber.on_subscribe(Arc::new(demand.clone()));

    let mut pending: Option<T> = None;
    loop {
        if demand.is_violated() {
            #[cfg(feature = "tracing")]
            tracing::event!(
                tracing::Level::WARN,
                event = "demandpipe.protocol.violation",
                stage = STAGE,
                rule = "request(0)",
                "demandpipe.protocol.violation"
            );
            demand.cancel();
            subscriber.on_error(Error::invalid_demand(0));
            return;
        }
        if cancel.is_cancelled() {
            cancelled(STAGE, "deliver");
            return;
        }

        match pending.take() {
            Some(item) => {
                if demand.try_acquire() {
                    subscriber.on_next(item);
                    continue;
                }
                pending = Some(item);
                tokio::select! {
                    _ = cancel.cancelled() => {},
                    _ = demand.granted() => {},
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => {},
                    _ = demand.violated() => {},
                    msg = input.recv() => match msg {
                        Some(item) => pending = Some(item),
                        None => break,
                    },
                }
            }
        }
    }

    let result = outcome
        .await
        .unwrap_or_else(|_| Err(Error::pipeline("upstream finished without an outcome")));

    // A cancel racing with upstream completion wins: no terminal signal.
    if cancel.is_cancelled() {
        cancelled(STAGE, "terminal");
        return;
    }

    match result {
        Ok(()) => subscriber.on_complete(),
        Err(error) => subscriber.on_error(error),
    }
}
