//! Bounded-demand consumption.
//!
//! Run with:
//!   RUST_LOG=demandpipe=info cargo run --example backpressure
//!
//! A consumer requests five elements up front and five more each time it has
//! consumed five. The three runs cover a count that is a multiple of the
//! limit, one that is not, and an empty source.

use std::sync::{Arc, Mutex};

use demandpipe::consumer::bounded::BoundedDemandSubscriber;
use demandpipe::error::Result;
use demandpipe::flow::subscriber::Termination;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::source::range::RangeSource;
use tracing_subscriber::EnvFilter;

const LIMIT: u64 = 5;

async fn consume(count: u64) -> Result<()> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_observer = seen.clone();
    let consumer = BoundedDemandSubscriber::new(LIMIT).on_value(move |v: &i64| {
        if let Ok(mut seen) = seen_in_observer.lock() {
            seen.push(*v);
        }
    });

    let rt = Runtime::new().buffer(16);
    let (_cancel, handle) = rt.subscribe(RangeSource::new(1, count), consumer);
    let consumer = handle.await??;

    let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
    println!("  received : {seen:?}");
    println!("  count    : {}", consumer.received());
    match consumer.termination() {
        Some(Termination::Completed) => println!("  outcome  : completed"),
        Some(Termination::Failed(err)) => println!("  outcome  : failed ({err})"),
        Some(Termination::Cancelled) => println!("  outcome  : cancelled"),
        None => println!("  outcome  : still running"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("demandpipe=info")))
        .init();

    println!("Bounded demand, limit = {LIMIT}\n");

    for count in [10, 7, 0] {
        println!("Source of {count} elements:");
        consume(count).await?;
        println!();
    }

    println!("Replenishment happens each time {LIMIT} elements have been consumed;");
    println!("look for `demandpipe.consumer.replenish` in the log above.");
    Ok(())
}
