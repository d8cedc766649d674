//! Topic registry and non-blocking fan-out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::subscription::{Message, Subscription, SubscriptionId};

/// Broker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Buffer capacity used by [`Broker::subscribe_default`]
    pub default_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { default_buffer: 64 }
    }
}

impl BrokerConfig {
    /// Create a new broker configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default subscriber buffer capacity
    pub fn with_default_buffer(mut self, capacity: usize) -> Self {
        self.default_buffer = capacity.max(1);
        self
    }
}

/// Outcome of one [`Broker::publish`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Subscribers that received the message
    pub delivered: usize,

    /// Subscribers whose buffer was full; they miss this message
    pub dropped: usize,

    /// Subscribers whose receive end was dropped without unsubscribing;
    /// they are removed from the registry by the same call
    pub closed: usize,
}

impl PublishReport {
    /// Subscribers the message was offered to
    pub fn offered(&self) -> usize {
        self.delivered + self.dropped + self.closed
    }
}

/// Point-in-time broker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    /// Topics with at least one subscription
    pub topics: usize,
    /// Live subscriptions across all topics
    pub subscriptions: usize,
    /// Publish calls
    pub published: u64,
    /// Successful per-subscriber deliveries
    pub delivered: u64,
    /// Per-subscriber deliveries dropped on a full buffer
    pub dropped: u64,
}

type TopicSubscribers<P> = HashMap<SubscriptionId, Sender<Message<P>>>;

/// Topic-based publish/subscribe broker
///
/// Subscribe and unsubscribe take the registry's exclusive lock. Publish only
/// takes the shared lock and delivers with an attempt-send-or-drop, so it
/// never blocks on a slow subscriber.
///
/// # Example
///
/// ```
/// use synckit::pubsub::Broker;
///
/// let broker = Broker::new();
/// let sub = broker.subscribe("orders", 16);
///
/// let report = broker.publish("orders", "order-1".to_string());
/// assert_eq!(report.delivered, 1);
/// assert_eq!(sub.recv().unwrap().payload, "order-1");
///
/// broker.unsubscribe("orders", sub.id());
/// assert!(sub.recv().is_none()); // end-of-stream, not a hang
/// ```
pub struct Broker<P> {
    config: BrokerConfig,
    topics: RwLock<HashMap<String, TopicSubscribers<P>>>,
    next_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl<P: Clone> Broker<P> {
    /// Create a broker with the default configuration
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Create a broker with the given configuration
    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscription on `topic` with room for `capacity` messages
    ///
    /// A capacity of 0 is raised to 1 so the subscription can buffer at all.
    pub fn subscribe(&self, topic: impl Into<String>, capacity: usize) -> Subscription<P> {
        let topic = topic.into();
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);

        let id = {
            let mut topics = self.topics.write();
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            topics.entry(topic.clone()).or_default().insert(id, tx);
            id
        };

        debug!(topic = %topic, subscription = id, capacity, "Subscribed");
        Subscription::new(id, topic, rx)
    }

    /// Subscribe with the configured default buffer capacity
    pub fn subscribe_default(&self, topic: impl Into<String>) -> Subscription<P> {
        self.subscribe(topic, self.config.default_buffer)
    }

    /// Fan `payload` out to every current subscriber of `topic`
    ///
    /// Never blocks. A subscriber with a full buffer misses this message;
    /// the others still get it. Publishing to a topic nobody subscribes to
    /// is a no-op.
    pub fn publish(&self, topic: &str, payload: P) -> PublishReport {
        self.published.fetch_add(1, Ordering::Relaxed);

        let topics = self.topics.read();
        let Some(subscribers) = topics.get(topic) else {
            return PublishReport::default();
        };

        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        let mut report = PublishReport::default();
        let mut disconnected = Vec::new();
        for (&id, tx) in subscribers {
            match tx.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(topic, subscription = id, "Subscriber buffer full, dropping message");
                    report.dropped += 1;
                }
                Err(TrySendError::Disconnected(_)) => {
                    report.closed += 1;
                    disconnected.push(id);
                }
            }
        }
        drop(topics);

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);

        if report.dropped > 0 {
            debug!(topic, dropped = report.dropped, "Slow subscribers missed a message");
        }
        if !disconnected.is_empty() {
            self.prune(topic, &disconnected);
        }
        report
    }

    /// Forget subscriptions whose receive end was dropped without unsubscribing
    fn prune(&self, topic: &str, ids: &[SubscriptionId]) {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return;
        };

        for id in ids {
            subscribers.remove(id);
        }
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        drop(topics);

        debug!(topic, pruned = ids.len(), "Pruned abandoned subscriptions");
    }

    /// Remove a subscription and close its channel
    ///
    /// A reader blocked on the subscription is released with end-of-stream
    /// once any buffered messages are consumed. The topic entry goes away
    /// with its last subscription. Unknown pairs are ignored; the return
    /// value tells whether anything was removed.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(topic) else {
            return false;
        };

        // Dropping the only sender is what closes the channel
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            topics.remove(topic);
        }
        drop(topics);

        if removed {
            debug!(topic, subscription = id, "Unsubscribed");
        }
        removed
    }

    /// Remove every subscription on `topic`, closing their channels
    pub fn close_topic(&self, topic: &str) -> usize {
        let removed = self.topics.write().remove(topic);
        let count = removed.map_or(0, |subs| subs.len());
        if count > 0 {
            debug!(topic, subscriptions = count, "Closed topic");
        }
        count
    }

    /// Number of subscriptions on `topic` right now
    pub fn topic_subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, |subs| subs.len())
    }

    /// Snapshot of topics that have subscribers
    pub fn topics(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    /// Snapshot of broker counters
    pub fn stats(&self) -> BrokerStats {
        let (topics, subscriptions) = {
            let registry = self.topics.read();
            (registry.len(), registry.values().map(|s| s.len()).sum())
        };

        BrokerStats {
            topics,
            subscriptions,
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Get the broker configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

impl<P: Clone> Default for Broker<P> {
    fn default() -> Self {
        Self::new()
    }
}
