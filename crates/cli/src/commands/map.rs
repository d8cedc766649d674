// Concurrent map integrity scenario

use std::thread;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use synckit::ConcurrentMap;
use tracing::info;

use crate::output::{print_field, OutputFormat};

const ROUNDS: usize = 20;

#[derive(Args, Debug)]
pub struct MapArgs {
    /// Number of writer threads
    #[arg(long, short, default_value = "8")]
    pub threads: usize,

    /// Keys owned by each thread
    #[arg(long, short, default_value = "100")]
    pub keys: usize,
}

#[derive(Debug, Serialize)]
struct MapReport {
    threads: usize,
    keys_per_thread: usize,
    entries: usize,
    mismatches: usize,
    elapsed_ms: u64,
}

pub fn run(args: MapArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    info!(threads = args.threads, keys = args.keys, "Running map scenario");
    let map: ConcurrentMap<(usize, usize), usize> =
        ConcurrentMap::with_capacity(args.threads * args.keys);
    let started = Instant::now();

    thread::scope(|s| {
        for t in 0..args.threads {
            let map = &map;
            let keys = args.keys;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    for k in 0..keys {
                        map.set((t, k), round);
                        // Read a neighbour's key to keep readers and writers interleaved
                        let _ = map.get(&((t + 1) % args.threads, k));
                    }
                }
            });
        }
    });

    let mut mismatches = 0;
    map.for_each(|_, round| {
        if *round != ROUNDS - 1 {
            mismatches += 1;
        }
    });

    let report = MapReport {
        threads: args.threads,
        keys_per_thread: args.keys,
        entries: map.len(),
        mismatches,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        entries = report.entries,
        mismatches = report.mismatches,
        "Map scenario finished"
    );

    if output.is_text() {
        if !quiet {
            print_field("Threads", report.threads);
            print_field("Keys/thread", report.keys_per_thread);
        }
        print_field("Entries", report.entries);
        print_field("Mismatches", report.mismatches);
        print_field("Elapsed", format!("{}ms", report.elapsed_ms));
    } else {
        output.print_value(&report)?;
    }

    let expected = args.threads * args.keys;
    if report.entries != expected || report.mismatches > 0 {
        bail!(
            "map integrity check failed: {} entries (expected {}), {} mismatches",
            report.entries,
            expected,
            report.mismatches
        );
    }
    Ok(())
}
