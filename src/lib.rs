//! # demandpipe
//!
//! **Bounded-demand reactive streams on top of backpressure-aware Tokio pipelines.**
//!
//! `demandpipe` lets a consumer pace a producer with an explicit
//! request-credit protocol instead of draining it eagerly:
//!
//! - request `L` elements when subscribing
//! - count deliveries
//! - request `L` more each time `L` have been consumed
//!
//! The producer side is an ordinary pipeline of async stages connected by
//! bounded channels, so memory stays bounded even when nobody asks for more.
//!
//! ---
//!
//! ## Core Model
//!
//! ```text
//! Source → Operators → Delivery loop ⇄ Subscriber
//!                         ▲   request(n)  │
//!                         └───────────────┘
//! ```
//!
//! Each stage implements the [`Pipe`] trait. A [`Subscriber`] is attached
//! with [`Runtime::subscribe`]; it receives a [`Subscription`] in
//! `on_subscribe` and only ever sees as many elements as it requested.
//!
//! ---
//!
//! ## Example
//!
//! Consume `1..=10` five at a time:
//!
//! ```no_run
//! use demandpipe::consumer::bounded::BoundedDemandSubscriber;
//! use demandpipe::pipeline::runtime::Runtime;
//! use demandpipe::source::range::RangeSource;
//!
//! #[tokio::main]
//! async fn main() -> demandpipe::error::Result<()> {
//!     let rt = Runtime::new().buffer(16);
//!     let (_cancel, handle) = rt.subscribe(RangeSource::new(1, 10), BoundedDemandSubscriber::new(5));
//!
//!     let consumer = handle.await??;
//!     assert_eq!(consumer.received(), 10);
//!     Ok(())
//! }
//! ```
//!
//! ---
//!
//! ## Operators
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use demandpipe::pipeline::chain::PipeExt;
//! use demandpipe::pipeline::retry::RetryPolicy;
//! use demandpipe::source::interval::IntervalSource;
//! use demandpipe::source::range::RangeSource;
//!
//! # fn example() {
//! let zipped = RangeSource::new(1, 12)
//!     .zip_with(IntervalSource::new(Duration::from_secs(1)), |value, _tick| value)
//!     .map(|v| v * 2)
//!     .filter(|v| *v > 4)
//!     .flat_map(|v| if v % 3 == 0 { Some(v) } else { None });
//!
//! let guarded = IntervalSource::new(Duration::from_secs(1))
//!     .try_map("guard", |tick| async move {
//!         if tick >= 5 {
//!             Err(demandpipe::error::Error::upstream("only up to 5"))
//!         } else {
//!             Ok(format!("hello {tick}"))
//!         }
//!     })
//!     .retry(RetryPolicy::retries(2));
//! # let _ = (zipped, guarded);
//! # }
//! ```
//!
//! `RetryPolicy::new(max_attempts)` retries nothing by default.
//! Configure retryability explicitly via `.retry_if(...)`, or use
//! `RetryPolicy::retries(n)` to re-run after any error `n` more times.
//! `try_map` fails its stage on the first `Err`; `.retry(policy)` on a
//! source re-runs the whole source, replaying what it already emitted.
//!
//! ---
//!
//! ## Error Handling Contract
//!
//! - Upstream failures reach the subscriber through `on_error`, after every
//!   element produced before the failure.
//! - `request(0)` is a protocol violation: the subscription is cancelled and
//!   the subscriber gets `Error::InvalidDemand`.
//! - A failing `try_map` surfaces as `Error::Stage { stage, .. }`; a source
//!   whose retries run out surfaces as `Error::RetryExhausted`.
//!
//! ---
//!
//! ## Cancellation
//!
//! Every pipeline and subscription carries a [`CancelToken`]. Cancelling it
//! stops every stage promptly; a cancelled subscription receives no
//! terminal signal.
//!
//! ---
//!
//! ## Observability
//!
//! The default `tracing` feature emits structured events such as
//! `demandpipe.consumer.next`, `demandpipe.consumer.replenish`,
//! `demandpipe.consumer.error`, `demandpipe.retry.attempt_failed`,
//! `demandpipe.retry.resubscribe`, `demandpipe.downstream.closed` and
//! `demandpipe.cancelled`, inside a `demandpipe.stage` span per spawned task.
//!
//! ```ignore
//! use tracing_subscriber::fmt;
//!
//! fn main() {
//!     fmt()
//!         .with_target(false)
//!         .with_env_filter("demandpipe=info")
//!         .init();
//! }
//! ```
//!
//! [`Pipe`]: pipeline::pipe::Pipe
//! [`Subscriber`]: flow::subscriber::Subscriber
//! [`Subscription`]: flow::subscriber::Subscription
//! [`Runtime::subscribe`]: pipeline::runtime::Runtime::subscribe
//! [`CancelToken`]: pipeline::cancel::CancelToken

pub mod consumer;
pub mod error;
pub mod flow;
pub mod pipeline;
pub mod sink;
pub mod source;

pub mod prelude {
    //! Convenient imports for most `demandpipe` users.

    pub use crate::consumer::bounded::BoundedDemandSubscriber;
    pub use crate::consumer::lambda::LambdaSubscriber;
    pub use crate::flow::subscriber::{Subscriber, SubscriberState, Subscription, Termination};
    pub use crate::pipeline::cancel::CancelToken;
    pub use crate::pipeline::chain::PipeExt;
    pub use crate::pipeline::retry::RetryPolicy;
    pub use crate::pipeline::runtime::Runtime;
}
