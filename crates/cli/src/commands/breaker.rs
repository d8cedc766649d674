// Circuit breaker trip-and-recover scenario

use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use synckit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use tracing::info;

use crate::output::{print_table_header, print_table_row, OutputFormat};

#[derive(Args, Debug)]
pub struct BreakerArgs {
    /// Failures in closed state before the circuit opens
    #[arg(long, default_value = "3")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes before the circuit closes
    #[arg(long, default_value = "2")]
    pub success_threshold: u32,

    /// Open-state cooldown in milliseconds
    #[arg(long, default_value = "50")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Ok,
    Failed,
    Rejected,
}

#[derive(Debug, Serialize)]
struct Step {
    step: usize,
    call: &'static str,
    outcome: Outcome,
    state: CircuitState,
    failures: u32,
    successes: u32,
}

pub fn run(args: BreakerArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    info!(
        failure_threshold = args.failure_threshold,
        success_threshold = args.success_threshold,
        timeout_ms = args.timeout_ms,
        "Running breaker scenario"
    );
    let timeout = Duration::from_millis(args.timeout_ms);
    let breaker = CircuitBreaker::with_name(
        "cli",
        CircuitBreakerConfig::new()
            .with_failure_threshold(args.failure_threshold)
            .with_success_threshold(args.success_threshold)
            .with_reset_timeout(timeout),
    );
    let config = breaker.config().clone();

    let mut steps = Vec::new();
    let mut call = |succeed: bool| {
        let result = breaker.execute(|| if succeed { Ok(()) } else { Err("simulated failure") });
        let outcome = match result {
            Ok(()) => Outcome::Ok,
            Err(CircuitBreakerError::Operation(_)) => Outcome::Failed,
            Err(CircuitBreakerError::Open) => Outcome::Rejected,
        };
        let snapshot = breaker.snapshot();
        steps.push(Step {
            step: steps.len() + 1,
            call: if succeed { "success" } else { "failure" },
            outcome,
            state: snapshot.state,
            failures: snapshot.counters.failures,
            successes: snapshot.counters.successes,
        });
    };

    for _ in 0..config.failure_threshold {
        call(false);
    }
    // Rejected while the cooldown runs
    call(true);

    thread::sleep(timeout + Duration::from_millis(10));
    for _ in 0..config.success_threshold {
        call(true);
    }
    call(false);

    info!(steps = steps.len(), state = %breaker.state(), "Breaker scenario finished");

    if output.is_text() {
        if !quiet {
            print_table_header(&[
                ("STEP", 4),
                ("CALL", 8),
                ("OUTCOME", 9),
                ("STATE", 10),
                ("FAILURES", 8),
                ("SUCCESSES", 9),
            ]);
            for step in &steps {
                print_table_row(&[
                    (&step.step.to_string(), 4),
                    (step.call, 8),
                    (&format!("{:?}", step.outcome).to_lowercase(), 9),
                    (&step.state.to_string(), 10),
                    (&step.failures.to_string(), 8),
                    (&step.successes.to_string(), 9),
                ]);
            }
            println!();
        }
        println!("Final state: {}", breaker.state());
    } else {
        output.print_value(&serde_json::json!({
            "config": config,
            "steps": steps,
            "final": breaker.snapshot(),
        }))?;
    }

    Ok(())
}
