use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use demandpipe::consumer::lambda::LambdaSubscriber;
use demandpipe::error::{Error, Result};
use demandpipe::flow::subscriber::Termination;
use demandpipe::pipeline::chain::PipeExt;
use demandpipe::pipeline::retry::RetryPolicy;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::source::interval::IntervalSource;
use demandpipe::source::iter::IterSource;
use tokio::sync::Notify;

mod common;
use common::CollectSink;

#[tokio::test(start_paused = true)]
async fn resubscribe_waits_for_advance_before_next_run() -> Result<()> {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in_op = attempts.clone();
    let collected = Arc::new(Mutex::new(Vec::<u32>::new()));
    let sink = CollectSink::new(collected.clone());

    let retry = RetryPolicy::new(2)
        .base_delay(Duration::from_secs(1))
        .max_delay(Duration::from_secs(1))
        .retry_if(|_| true);

    let pipe = IterSource::new(vec![2u32])
        .try_map("retry_time", move |value| {
            let attempts = attempts_in_op.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    Err(Error::pipeline("transient"))
                } else {
                    Ok(value * 2)
                }
            }
        })
        .retry(retry)
        .pipe::<(), _>(sink);

    let rt = Runtime::new().buffer(16);
    let (tx, mut rx, _cancel, handle) = rt.spawn(pipe);
    let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

    tx.send(()).await.expect("start send failed");
    drop(tx);

    for _ in 0..10 {
        if attempts.load(Ordering::SeqCst) >= 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(
        !handle.is_finished(),
        "source should be waiting out its backoff"
    );

    tokio::time::advance(Duration::from_millis(999)).await;
    tokio::task::yield_now().await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(!handle.is_finished(), "pipeline should still be sleeping");

    tokio::time::advance(Duration::from_millis(1)).await;
    handle.await??;
    drain.await.expect("drain join failed");

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(&*collected.lock().expect("mutex poisoned"), &[4]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_paused_backoff_finishes_without_advance() -> Result<()> {
    let started = Arc::new(Notify::new());
    let started_in_op = started.clone();

    let retry = RetryPolicy::new(10)
        .base_delay(Duration::from_secs(3600))
        .max_delay(Duration::from_secs(3600))
        .retry_if(|_| true);

    let pipe = IterSource::new(vec![1u32])
        .try_map("cancel_paused", move |_| {
            let started = started_in_op.clone();
            async move {
                started.notify_one();
                Err::<u32, Error>(Error::pipeline("transient"))
            }
        })
        .retry(retry);

    let rt = Runtime::new().buffer(16);
    let (tx, _rx, cancel, handle) = rt.spawn(pipe);
    tx.send(()).await.expect("start send failed");
    started.notified().await;
    cancel.cancel();
    drop(tx);

    for _ in 0..10 {
        if handle.is_finished() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(
        handle.is_finished(),
        "pipeline should stop after cancellation without advancing time"
    );

    handle.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn guarded_interval_replays_its_prefix_until_retries_run_out() -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen_in_next = seen.clone();

    let source = IntervalSource::new(Duration::from_secs(1))
        .try_map("guard", |tick| async move {
            if tick >= 5 {
                Err(Error::upstream("tick limit reached"))
            } else {
                Ok(format!("hello {tick}"))
            }
        })
        .retry(RetryPolicy::retries(2));

    let subscriber =
        LambdaSubscriber::new(move |line: String| seen_in_next.lock().expect("mutex poisoned").push(line));

    let rt = Runtime::new().buffer(8);
    let (_cancel, handle) = rt.subscribe(source, subscriber);
    let subscriber = handle.await??;

    let run: Vec<String> = (0..5).map(|tick| format!("hello {tick}")).collect();
    let expected: Vec<String> = run.iter().cycle().take(15).cloned().collect();
    assert_eq!(*seen.lock().expect("mutex poisoned"), expected);

    let termination = subscriber.termination().expect("terminated");
    assert!(termination.is_failed());
    assert!(matches!(
        termination.error(),
        Some(Error::RetryExhausted { stage: "guard", attempts: 3, .. })
    ));
    assert!(!matches!(termination, Termination::Cancelled));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn resubscribe_backs_off_between_runs() -> Result<()> {
    let runs = Arc::new(Mutex::new(Vec::<tokio::time::Instant>::new()));
    let runs_in_op = runs.clone();

    let pipe = IterSource::new(vec![1u32])
        .try_map("stamp", move |_| {
            runs_in_op
                .lock()
                .expect("mutex poisoned")
                .push(tokio::time::Instant::now());
            async move { Err::<u32, Error>(Error::upstream("down")) }
        })
        .retry(
            RetryPolicy::new(3)
                .base_delay(Duration::from_secs(1))
                .max_delay(Duration::from_secs(10))
                .retry_if(|_| true),
        );

    let rt = Runtime::new().buffer(4);
    let (tx, _rx, _cancel, handle) = rt.spawn(pipe);
    tx.send(()).await.expect("start send failed");
    drop(tx);

    let err = handle.await.expect("join failed").unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));

    let runs = runs.lock().expect("mutex poisoned");
    assert_eq!(runs.len(), 3);
    // Exponential: 1s after the first failure, 2s after the second.
    assert!(runs[1] - runs[0] >= Duration::from_secs(1));
    assert!(runs[2] - runs[1] >= Duration::from_secs(2));
    Ok(())
}
