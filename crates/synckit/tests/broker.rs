//! Fan-out, lossy delivery and end-of-stream behaviour of the broker

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use synckit::{Broker, ReceiveError};

#[test_log::test]
fn test_publish_never_blocks_on_slow_subscriber() {
    let broker = Broker::new();
    let slow = broker.subscribe("prices", 1);
    let fast = broker.subscribe("prices", 1_000);

    let started = Instant::now();
    for i in 0..500u32 {
        broker.publish("prices", i);
    }
    assert!(started.elapsed() < Duration::from_secs(2));

    let fast_seen: Vec<u32> = fast.try_iter_all();
    assert_eq!(fast_seen, (0..500).collect::<Vec<_>>());

    // The slow subscriber kept only the first message
    assert_eq!(slow.try_recv().unwrap().payload, 0);
    assert_eq!(slow.try_recv().unwrap_err(), ReceiveError::Empty);

    let stats = broker.stats();
    assert_eq!(stats.published, 500);
    assert_eq!(stats.delivered, 501);
    assert_eq!(stats.dropped, 499);
}

#[test]
fn test_unsubscribe_releases_blocked_reader() {
    let broker: Broker<String> = Broker::new();
    let sub = broker.subscribe("events", 4);
    let id = sub.id();

    let (done_tx, done_rx) = mpsc::channel();
    let reader = thread::spawn(move || {
        let received = sub.recv();
        let _ = done_tx.send(received.is_none());
    });

    thread::sleep(Duration::from_millis(20));
    assert!(broker.unsubscribe("events", id));

    let ended = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("reader was not released");
    assert!(ended);
    reader.join().unwrap();

    assert_eq!(broker.topic_subscriber_count("events"), 0);
    assert!(broker.topics().is_empty());
}

#[test]
fn test_buffered_messages_survive_unsubscribe() {
    let broker = Broker::new();
    let sub = broker.subscribe("t", 8);
    broker.publish("t", "a");
    broker.publish("t", "b");
    broker.unsubscribe("t", sub.id());

    let drained: Vec<&str> = sub.iter().map(|m| m.payload).collect();
    assert_eq!(drained, ["a", "b"]);
    assert_eq!(
        sub.recv_timeout(Duration::from_millis(10)).unwrap_err(),
        ReceiveError::Closed
    );
}

#[test]
fn test_single_publisher_order_per_subscriber() {
    let broker = Broker::new();
    let subs: Vec<_> = (0..4).map(|_| broker.subscribe("seq", 256)).collect();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200u64 {
                broker.publish("seq", i);
            }
        });
    });

    for sub in &subs {
        let seen: Vec<u64> = sub.try_iter_all();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }
}

#[test]
fn test_subscribe_unsubscribe_publish_concurrently() {
    let broker = Broker::new();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    let sub = broker.subscribe("churn", 2);
                    broker.publish("churn", 1u8);
                    let _ = broker.topic_subscriber_count("churn");
                    broker.unsubscribe("churn", sub.id());
                }
            });
        }
    });

    assert_eq!(broker.topic_subscriber_count("churn"), 0);
    assert_eq!(broker.stats().published, 400);
}

#[test]
fn test_ids_unique_across_topics() {
    let broker: Broker<()> = Broker::new();
    let a = broker.subscribe("a", 1);
    let b = broker.subscribe("b", 1);
    let c = broker.subscribe("a", 1);
    assert_ne!(a.id(), b.id());
    assert_ne!(a.id(), c.id());
    assert_ne!(b.id(), c.id());
}

trait DrainPayloads<P> {
    fn try_iter_all(&self) -> Vec<P>;
}

impl<P> DrainPayloads<P> for synckit::Subscription<P> {
    fn try_iter_all(&self) -> Vec<P> {
        let mut out = Vec::new();
        while let Ok(message) = self.try_recv() {
            out.push(message.payload);
        }
        out
    }
}
