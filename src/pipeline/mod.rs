pub mod adapters;
pub mod adapters_try;
pub mod cancel;
pub mod chain;
pub(crate) mod config;
pub mod pipe;
pub mod resubscribe;
pub mod retry;
pub mod runtime;
pub mod zip;
