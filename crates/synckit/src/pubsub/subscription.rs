//! Receive end of a topic subscription

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};

/// Identifier of a subscription, unique per broker
pub type SubscriptionId = u64;

/// A published message as seen by one subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message<P> {
    /// Topic the message was published on
    pub topic: String,

    /// Subscriber's own copy of the payload
    pub payload: P,
}

/// Errors from the non-blocking and timed receive calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    /// Nothing buffered right now
    #[error("no message available")]
    Empty,

    /// Nothing arrived before the timeout
    #[error("timed out waiting for a message")]
    Timeout,

    /// The subscription was removed and its buffer is drained
    #[error("subscription closed")]
    Closed,
}

/// A live subscription to one topic
///
/// Messages already buffered when the subscription is removed are still
/// handed out; after that every receive call reports end-of-stream instead
/// of blocking.
#[derive(Debug)]
pub struct Subscription<P> {
    id: SubscriptionId,
    topic: String,
    rx: Receiver<Message<P>>,
}

impl<P> Subscription<P> {
    pub(super) fn new(id: SubscriptionId, topic: String, rx: Receiver<Message<P>>) -> Self {
        Self { id, topic, rx }
    }

    /// Subscription ID, as passed to [`Broker::unsubscribe`](super::Broker::unsubscribe)
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Topic this subscription listens on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Block for the next message; `None` means end-of-stream
    pub fn recv(&self) -> Option<Message<P>> {
        self.rx.recv().ok()
    }

    /// Take a buffered message without blocking
    pub fn try_recv(&self) -> Result<Message<P>, ReceiveError> {
        self.rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => ReceiveError::Empty,
            TryRecvError::Disconnected => ReceiveError::Closed,
        })
    }

    /// Block for the next message, up to `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Message<P>, ReceiveError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => ReceiveError::Timeout,
            RecvTimeoutError::Disconnected => ReceiveError::Closed,
        })
    }

    /// Blocking iterator that ends at end-of-stream
    pub fn iter(&self) -> impl Iterator<Item = Message<P>> + '_ {
        self.rx.iter()
    }

    /// Messages currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Buffer capacity
    pub fn capacity(&self) -> usize {
        // Subscriptions are always bounded
        self.rx.capacity().unwrap_or(0)
    }

    /// Underlying receiver, for use with `crossbeam_channel::select!`
    pub fn as_receiver(&self) -> &Receiver<Message<P>> {
        &self.rx
    }
}

impl<P> IntoIterator for Subscription<P> {
    type Item = Message<P>;
    type IntoIter = crossbeam_channel::IntoIter<Message<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_receive_then_end_of_stream() {
        let (tx, rx) = bounded(4);
        let sub = Subscription::new(7, "events".to_string(), rx);

        tx.send(Message {
            topic: "events".to_string(),
            payload: 1,
        })
        .unwrap();
        assert_eq!(sub.len(), 1);
        drop(tx);

        // Buffered message survives the close
        assert_eq!(sub.recv().map(|m| m.payload), Some(1));
        assert_eq!(sub.recv(), None);
        assert_eq!(sub.try_recv(), Err(ReceiveError::Closed));
    }

    #[test]
    fn test_try_recv_empty_and_timeout() {
        let (_tx, rx) = bounded::<Message<()>>(2);
        let sub = Subscription::new(1, "t".to_string(), rx);

        assert_eq!(sub.id(), 1);
        assert_eq!(sub.topic(), "t");
        assert_eq!(sub.capacity(), 2);
        assert_eq!(sub.try_recv(), Err(ReceiveError::Empty));
        assert_eq!(
            sub.recv_timeout(Duration::from_millis(10)),
            Err(ReceiveError::Timeout)
        );
    }
}
