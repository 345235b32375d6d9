//! Replay a recorded hook stream through the reporter

use anyhow::{bail, Context, Result};
use clap::Args;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use cynova::{CyNovaRun, InboundEvent, Outcome, Reporter};

use crate::output::{format_millis, print_failure, print_success};

#[derive(Args)]
pub struct ReplayArgs {
    /// NDJSON file with one `{"event", "payload"}` object per line, `-` for stdin
    pub events: PathBuf,

    /// Reporter config file (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip the HTML report
    #[arg(long)]
    pub no_html: bool,

    /// Serve live updates while replaying
    #[arg(long)]
    pub live: bool,

    /// Live server port
    #[arg(long, requires = "live")]
    pub port: Option<u16>,

    /// Delay between events, so live observers can follow along
    #[arg(long, default_value_t = 0)]
    pub pace_ms: u64,
}

/// Replay every event and return the finished run
pub async fn execute(args: ReplayArgs) -> Result<CyNovaRun> {
    let mut options = super::load_options(args.config.as_deref(), args.output_dir)?;
    if args.no_html {
        options.generate_html = false;
    }
    if args.live {
        options.live_server.enabled = true;
    }
    if let Some(port) = args.port {
        options.live_server.port = port;
    }

    let lines = read_lines(&args.events)?;
    let reporter = Reporter::new(options);
    if let Some(addr) = reporter.live_addr() {
        print_success(&format!("Live updates on ws://{}/", addr));
    }

    let pace = Duration::from_millis(args.pace_ms);
    let mut finished = None;
    for (number, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match InboundEvent::parse_line(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: {}", number + 1, e);
                continue;
            }
        };

        match reporter.dispatch(event) {
            Outcome::Finished(run) => finished = Some(run),
            Outcome::TaskAck(None) => debug!("Line {}: task not handled by CyNova", number + 1),
            _ => {}
        }
        if !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }
    }
    reporter.shutdown();

    let Some(run) = finished else {
        bail!("{} has no after:run event", args.events.display());
    };
    report(&run, &reporter.options().summary_path());
    Ok(*run)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Box::new(BufReader::new(file))
    };
    reader
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading {}", path.display()))
}

fn report(run: &CyNovaRun, summary: &Path) {
    let totals = &run.totals;
    let line = format!(
        "{} tests, {} passed, {} failed, {} pending, {} skipped in {}",
        totals.tests,
        totals.passed,
        totals.failed,
        totals.pending,
        totals.skipped,
        format_millis(totals.duration_ms)
    );
    if totals.failed > 0 {
        print_failure(&line);
    } else {
        print_success(&line);
    }

    if let Some(analytics) = &run.analytics {
        for flaky in analytics.flaky_tests.iter().flatten() {
            println!(
                "  flaky: {} ({}) score {:.2}",
                flaky.display_title.as_deref().unwrap_or(&flaky.test_id),
                flaky.spec_relative,
                flaky.flaky_score
            );
        }
    }
    println!("  summary: {}", summary.display());
}
