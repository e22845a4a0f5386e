use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use demandpipe::error::{Error, Result};
use demandpipe::pipeline::chain::PipeExt;
use demandpipe::pipeline::retry::RetryPolicy;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::source::create::CreateSource;
use demandpipe::source::iter::IterSource;

mod common;
use common::CollectSink;

// ── try_map ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn try_map_fails_the_stage_on_the_first_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_op = calls.clone();
    let collected = Arc::new(Mutex::new(Vec::<u32>::new()));

    let pipe = IterSource::new(vec![1u32, 2, 3, 4])
        .try_map("parse", move |n| {
            calls_in_op.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 3 {
                    Err(Error::upstream("bad record"))
                } else {
                    Ok(n * 10)
                }
            }
        })
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(1);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let err = handle.await.unwrap().unwrap_err();
    match err {
        Error::Stage { stage, source } => {
            assert_eq!(stage, "parse");
            assert!(matches!(*source, Error::Upstream { ref message } if message == "bad record"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*collected.lock().unwrap(), vec![10, 20]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn try_map_passes_everything_through_when_nothing_fails() -> Result<()> {
    let pipe = IterSource::new(vec!["1", "22", "333"])
        .try_map("len", |s: &'static str| async move { Ok(s.len()) });

    let rt = Runtime::new().buffer(4);
    let (tx, mut rx, _cancel, handle) = rt.spawn(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let mut out = Vec::new();
    while let Some(v) = rx.recv().await {
        out.push(v);
    }
    handle.await??;
    assert_eq!(out, vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn a_failing_try_map_is_rerun_by_retry() {
    let collected = Arc::new(Mutex::new(Vec::<u32>::new()));

    let pipe = IterSource::new(vec![1u32, 2, 3])
        .try_map("below_three", |n| async move {
            if n >= 3 {
                Err(Error::upstream(format!("{n} is too big")))
            } else {
                Ok(n)
            }
        })
        .retry(RetryPolicy::retries(1))
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(4);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let err = handle.await.unwrap().unwrap_err();
    match err {
        Error::RetryExhausted {
            stage,
            attempts,
            source,
        } => {
            assert_eq!(stage, "below_three");
            assert_eq!(attempts, 2);
            assert!(matches!(*source, Error::Stage { stage: "below_three", .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(*collected.lock().unwrap(), vec![1, 2, 1, 2]);
}

#[tokio::test]
async fn retry_predicate_picks_which_stage_failures_rerun() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_in_op = runs.clone();
    let collected = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    let pipe = IterSource::new(vec!["a", "b"])
        .try_map("flaky", move |s: &'static str| {
            let failing = s == "b" && runs_in_op.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if failing {
                    Err(Error::upstream("first b fails"))
                } else {
                    Ok(s)
                }
            }
        })
        .retry(
            RetryPolicy::new(3)
                .base_delay(Duration::from_millis(1))
                .retry_if(|err| matches!(err, Error::Stage { stage: "flaky", .. })),
        )
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(4);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);
    handle.await??;

    assert_eq!(*collected.lock().unwrap(), vec!["a", "a", "b"]);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    Ok(())
}

// ── retry (resubscribe) ───────────────────────────────────────────────────────

#[tokio::test]
async fn retry_resubscribes_until_the_source_succeeds() -> Result<()> {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_in_source = runs.clone();
    let collected = Arc::new(Mutex::new(Vec::<i64>::new()));

    let source = CreateSource::new(move |emitter| {
        let run = runs_in_source.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            emitter.next(1i64).await?;
            emitter.next(2).await?;
            if run < 3 {
                return Err(Error::upstream(format!("run {run} failed")));
            }
            emitter.next(3).await
        }
    });

    let pipe = source
        .retry(
            RetryPolicy::new(5)
                .base_delay(Duration::from_millis(1))
                .retry_if(|err| matches!(err, Error::Upstream { .. })),
        )
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(4);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);
    handle.await??;

    // Every failed run's prefix stays emitted.
    assert_eq!(*collected.lock().unwrap(), vec![1, 2, 1, 2, 1, 2, 3]);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn retry_gives_up_after_max_attempts() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_in_source = runs.clone();
    let collected = Arc::new(Mutex::new(Vec::<i64>::new()));

    let source = CreateSource::new(move |emitter| {
        runs_in_source.fetch_add(1, Ordering::SeqCst);
        async move {
            emitter.next(7i64).await?;
            Err(Error::upstream("always"))
        }
    });

    let pipe = source
        .retry(
            RetryPolicy::new(3)
                .base_delay(Duration::from_millis(1))
                .retry_if(|_| true),
        )
        .pipe::<(), _>(CollectSink::new(collected.clone()));

    let rt = Runtime::new().buffer(4);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let err = handle.await.unwrap().unwrap_err();
    match err {
        Error::RetryExhausted {
            stage,
            attempts,
            source,
        } => {
            assert_eq!(stage, "create");
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::Upstream { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(*collected.lock().unwrap(), vec![7, 7, 7]);
}

#[tokio::test]
async fn retry_without_predicate_fails_on_first_error() {
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_in_source = runs.clone();

    let source = CreateSource::new(move |emitter| {
        runs_in_source.fetch_add(1, Ordering::SeqCst);
        async move {
            emitter.next(1i64).await?;
            Err(Error::upstream("not retried"))
        }
    });

    let pipe = source
        .retry(RetryPolicy::new(5))
        .pipe::<(), _>(CollectSink::new(Arc::new(Mutex::new(Vec::<i64>::new()))));

    let rt = Runtime::new().buffer(4);
    let (tx, _cancel, handle) = rt.spawn_sink(pipe);
    tx.send(()).await.unwrap();
    drop(tx);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Upstream { message } if message == "not retried"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
