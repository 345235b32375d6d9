//! CyNova CLI - Main Entry Point
//!
//! Replays recorded hook streams through the reporter, re-renders HTML
//! reports from written summaries and inspects the run history.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{history, render, replay};

/// CyNova - run reporter and analytics for end-to-end test suites
#[derive(Parser)]
#[command(name = "cynova")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an NDJSON hook stream and write the reports
    Replay(replay::ReplayArgs),

    /// Render the HTML report from a summary JSON
    Render(render::RenderArgs),

    /// Show flaky tests, recent runs and browser aggregates
    History(history::HistoryArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}

/// Exit code 1 when the replayed run has failures
async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Replay(args) => {
            let run = replay::execute(args).await?;
            return Ok(i32::from(run.totals.failed > 0));
        }
        Commands::Render(args) => {
            render::execute(args)?;
        }
        Commands::History(args) => history::execute(args, cli.format)?,
        Commands::Version => {
            println!("CyNova CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("cynova-common v{}", cynova_common::VERSION);
        }
    }

    Ok(0)
}
