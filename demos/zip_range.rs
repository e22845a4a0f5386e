//! Pacing a finite range with an interval.
//!
//! Run with:
//!   cargo run --example zip_range
//!
//! `1..=12` is zipped with a one-second interval so one value is printed per
//! second; the interval is stopped as soon as the range runs out.

use std::time::Duration;

use demandpipe::consumer::bounded::BoundedDemandSubscriber;
use demandpipe::error::Result;
use demandpipe::pipeline::chain::PipeExt;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::source::interval::IntervalSource;
use demandpipe::source::range::RangeSource;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("demandpipe=info")))
        .init();

    let paced = RangeSource::new(1, 12).zip_with(
        IntervalSource::new(Duration::from_secs(1)),
        |value, _tick| value,
    );

    let consumer = BoundedDemandSubscriber::new(4).on_value(|v: &i64| println!("value {v}"));

    let rt = Runtime::new().buffer(4);
    let (_cancel, handle) = rt.subscribe(paced, consumer);
    let consumer = handle.await??;

    println!("consumed {} values", consumer.received());
    Ok(())
}
