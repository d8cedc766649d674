//! Topic-based publish/subscribe
//!
//! This module provides:
//! - [`Broker`] - registry of per-subscriber bounded channels, keyed by topic
//! - [`Subscription`] - the receive end handed out by [`Broker::subscribe`]
//! - [`Message`] - topic plus payload, fanned out by value
//!
//! # Delivery policy
//!
//! Best-effort fan-out: publishing never blocks. A subscriber whose buffer
//! is full misses that message and the publisher moves on to the next one,
//! so slow consumers may miss messages while fast consumers are unaffected.
//! Messages from one publishing thread reach each subscriber in publish
//! order; nothing is promised across topics or across concurrent publishers.
//! There is no replay: a subscription only sees messages published after it
//! was created.

mod broker;
mod subscription;

pub use broker::{Broker, BrokerConfig, BrokerStats, PublishReport};
pub use subscription::{Message, ReceiveError, Subscription, SubscriptionId};
