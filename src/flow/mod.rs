//! The demand protocol: subscribers, subscriptions and the delivery loop
//! that connects a source pipeline to a subscriber.

pub mod demand;
pub(crate) mod delivery;
pub mod subscriber;
