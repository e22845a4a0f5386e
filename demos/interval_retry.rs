//! Resubscribing to a failing interval.
//!
//! Run with:
//!   cargo run --example interval_retry
//!
//! An interval ticks once a second; a guard fails the stream at tick 5. The
//! whole source is re-run up to three times, so the five greetings appear
//! three times before the subscriber sees the final error.

use std::time::Duration;

use demandpipe::consumer::lambda::LambdaSubscriber;
use demandpipe::error::{Error, Result};
use demandpipe::pipeline::chain::PipeExt;
use demandpipe::pipeline::retry::RetryPolicy;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::source::interval::IntervalSource;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("demandpipe=warn")))
        .init();

    let source = IntervalSource::new(Duration::from_secs(1))
        .try_map("guard", |tick| async move {
            if tick >= 5 {
                Err(Error::upstream(format!("tick {tick} is past the limit")))
            } else {
                Ok(format!("hello {tick}"))
            }
        })
        .retry(
            RetryPolicy::new(3)
                .base_delay(Duration::from_millis(200))
                .retry_if(|_| true),
        );

    let subscriber = LambdaSubscriber::new(|line: String| println!("{line}"))
        .on_error(|err| println!("gave up: {err}"))
        .on_complete(|| println!("done"));

    let rt = Runtime::new();
    let (_cancel, handle) = rt.subscribe(source, subscriber);
    handle.await??;
    Ok(())
}
