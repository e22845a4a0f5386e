//! Operator tour.
//!
//! Run with:
//!   cargo run --example operators
//!
//! Each section builds a small pipeline and prints what reaches the end.

use std::time::Duration;

use demandpipe::consumer::lambda::LambdaSubscriber;
use demandpipe::error::Result;
use demandpipe::pipeline::chain::PipeExt;
use demandpipe::pipeline::runtime::Runtime;
use demandpipe::sink::log::LogSink;
use demandpipe::source::create::CreateSource;
use demandpipe::source::iter::IterSource;
use demandpipe::source::range::RangeSource;
use tracing_subscriber::EnvFilter;

const NAMES: [&str; 5] = [
    "Bruce Lee",
    "Milton Rojas",
    "Bruce Willis",
    "Ada Lovelace",
    "Bruce Wayne",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("demandpipe=info")))
        .init();

    let rt = Runtime::new().buffer(8);

    println!("── filter + map ──");
    let bruces = IterSource::new(NAMES)
        .filter(|name| name.starts_with("Bruce"))
        .map(|name: &str| name.to_uppercase());
    let (_cancel, handle) = rt.subscribe(bruces, LambdaSubscriber::new(|name: String| println!("{name}")));
    handle.await??;

    println!("\n── flat_map ──");
    let words = IterSource::new(NAMES).flat_map(|name: &str| {
        name.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
    });
    let (_cancel, handle) = rt.subscribe(words, LambdaSubscriber::new(|word: String| println!("{word}")));
    handle.await??;

    println!("\n── take + collect_list ──");
    let firsts = RangeSource::new(1, 1_000).take(6).collect_list();
    let (_cancel, handle) = rt.subscribe(firsts, LambdaSubscriber::new(|list: Vec<i64>| println!("{list:?}")));
    handle.await??;

    println!("\n── delay_elements ──");
    let slow = RangeSource::new(1, 3).delay_elements(Duration::from_millis(300));
    let (_cancel, handle) = rt.subscribe(slow, LambdaSubscriber::new(|v: i64| println!("tick {v}")));
    handle.await??;

    println!("\n── create + inspect into a log sink ──");
    let created = CreateSource::new(|emitter| async move {
        for name in ["Bruce Lee", "Bruce Willis"] {
            emitter.next(name.to_string()).await?;
        }
        Ok(())
    })
    .inspect(|name| println!("emitting {name}"))
    .pipe::<(), _>(LogSink::new("names"));
    let (tx, _cancel, handle) = rt.spawn_sink(created);
    let _ = tx.send(()).await;
    drop(tx);
    handle.await??;

    Ok(())
}
