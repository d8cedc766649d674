// Worker pool drain scenario

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use synckit::{Job, WorkerPool, WorkerPoolConfig};
use tracing::info;

use crate::output::{print_field, OutputFormat};

#[derive(Args, Debug)]
pub struct PoolArgs {
    /// Number of worker threads
    #[arg(long, short, env = "SYNCKIT_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Number of jobs to submit
    #[arg(long, short, env = "SYNCKIT_JOBS", default_value = "50")]
    pub jobs: u64,

    /// Bounded job queue capacity
    #[arg(long, default_value = "100")]
    pub queue_capacity: usize,

    /// Give up on the drain after this many milliseconds
    #[arg(long)]
    pub shutdown_timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PoolReport {
    pool_id: String,
    workers: usize,
    submitted: u64,
    accepted: usize,
    results: usize,
    status: String,
    elapsed_ms: u64,
}

pub fn run(args: PoolArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    let mut config = WorkerPoolConfig::new(args.workers).with_queue_capacity(args.queue_capacity);
    if let Some(ms) = args.shutdown_timeout_ms {
        config = config.with_shutdown_timeout(Duration::from_millis(ms));
    }

    info!(workers = args.workers, jobs = args.jobs, "Running pool scenario");
    let pool = WorkerPool::with_config(config).context("Failed to start worker pool")?;
    let started = Instant::now();

    for i in 0..args.jobs {
        pool.submit(Job::new(i, format!("job-{i}")))
            .with_context(|| format!("Failed to submit job {i}"))?;
    }
    pool.shutdown().context("Worker pool did not drain")?;

    let report = PoolReport {
        pool_id: pool.pool_id().to_string(),
        workers: args.workers,
        submitted: args.jobs,
        accepted: pool.accepted(),
        results: pool.result_count(),
        status: pool.status().to_string(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        accepted = report.accepted,
        results = report.results,
        elapsed_ms = report.elapsed_ms,
        "Pool scenario finished"
    );

    if output.is_text() {
        if !quiet {
            print_field("Pool", &report.pool_id);
            print_field("Workers", report.workers);
            print_field("Submitted", report.submitted);
        }
        print_field("Accepted", report.accepted);
        print_field("Results", report.results);
        print_field("Status", &report.status);
        print_field("Elapsed", format!("{}ms", report.elapsed_ms));
    } else {
        output.print_value(&report)?;
    }

    if report.results != report.accepted {
        bail!(
            "drain incomplete: {} accepted, {} processed",
            report.accepted,
            report.results
        );
    }
    Ok(())
}
