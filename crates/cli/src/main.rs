// Synckit CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json output formats for scripting.
// Design Decision: Logs go to stderr so json output on stdout stays parseable.

mod commands;
mod output;
mod telemetry;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "synckit")]
#[command(about = "Synckit CLI - Drive the concurrency primitives through scripted scenarios")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(
        long,
        short,
        env = "SYNCKIT_OUTPUT",
        default_value = "text",
        value_parser = ["text", "json"]
    )]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit jobs to a worker pool and shut it down, checking the drain
    Pool(commands::pool::PoolArgs),

    /// Fan messages out to fast subscribers and one slow subscriber
    Broker(commands::broker::BrokerArgs),

    /// Trip a circuit breaker, let it recover, then fail once more
    Breaker(commands::breaker::BreakerArgs),

    /// Hammer a concurrent map from several writer threads
    Map(commands::map::MapArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "info", "error" with --quiet)
    let mut log_config = telemetry::LogConfig::from_env();
    if cli.quiet && log_config.log_filter.is_none() {
        log_config.log_filter = Some("error".to_string());
    }
    telemetry::init_logging(log_config);

    let output_format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Pool(args) => commands::pool::run(args, output_format, cli.quiet),
        Commands::Broker(args) => commands::broker::run(args, output_format, cli.quiet),
        Commands::Breaker(args) => commands::breaker::run(args, output_format, cli.quiet),
        Commands::Map(args) => commands::map::run(args, output_format, cli.quiet),
    }
}
