// Broker fan-out scenario

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use synckit::{Broker, BrokerStats, Subscription};
use tracing::info;

use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};

const TOPIC: &str = "demo";

#[derive(Args, Debug)]
pub struct BrokerArgs {
    /// Number of fast subscribers (buffer large enough for every message)
    #[arg(long, short, default_value = "3")]
    pub subscribers: usize,

    /// Number of messages to publish
    #[arg(long, short, default_value = "100")]
    pub messages: u64,

    /// Buffer capacity of the slow subscriber, which reads nothing while publishing
    #[arg(long, default_value = "4")]
    pub slow_buffer: usize,
}

#[derive(Debug, Serialize)]
struct SubscriberReport {
    id: u64,
    kind: &'static str,
    buffer: usize,
    received: usize,
}

#[derive(Debug, Serialize)]
struct BrokerReport {
    topic: &'static str,
    published: u64,
    subscribers: Vec<SubscriberReport>,
    stats: BrokerStats,
}

pub fn run(args: BrokerArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    info!(
        subscribers = args.subscribers,
        messages = args.messages,
        slow_buffer = args.slow_buffer,
        "Running broker scenario"
    );
    let broker: Broker<u64> = Broker::new();

    let fast_buffer = usize::try_from(args.messages).unwrap_or(usize::MAX).max(1);
    let mut subscriptions: Vec<(&'static str, Subscription<u64>)> = (0..args.subscribers)
        .map(|_| ("fast", broker.subscribe(TOPIC, fast_buffer)))
        .collect();
    subscriptions.push(("slow", broker.subscribe(TOPIC, args.slow_buffer)));

    for i in 0..args.messages {
        broker.publish(TOPIC, i);
    }

    let subscribers = subscriptions
        .iter()
        .map(|&(kind, ref sub)| SubscriberReport {
            id: sub.id(),
            kind,
            buffer: sub.capacity(),
            received: std::iter::from_fn(|| sub.try_recv().ok()).count(),
        })
        .collect();

    let report = BrokerReport {
        topic: TOPIC,
        published: args.messages,
        subscribers,
        stats: broker.stats(),
    };

    info!(
        delivered = report.stats.delivered,
        dropped = report.stats.dropped,
        "Broker scenario finished"
    );

    if output.is_text() {
        if !quiet {
            print_field("Topic", report.topic);
            print_field("Published", report.published);
            println!();
        }

        print_table_header(&[("ID", 6), ("KIND", 6), ("BUFFER", 8), ("RECEIVED", 8)]);
        for sub in &report.subscribers {
            print_table_row(&[
                (&sub.id.to_string(), 6),
                (sub.kind, 6),
                (&sub.buffer.to_string(), 8),
                (&sub.received.to_string(), 8),
            ]);
        }

        println!();
        print_field("Delivered", report.stats.delivered);
        print_field("Dropped", report.stats.dropped);
    } else {
        output.print_value(&report)?;
    }

    Ok(())
}
