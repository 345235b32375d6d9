//! Inspect the run history: flaky tests, pass-rate trend, browsers

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use cynova::analytics::{flaky, history, trends, HistoryRunEntry};
use cynova_common::{pass_rate_pct, BrowserStats, FlakyTestInsight};

use crate::output::{format_millis, print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct HistoryArgs {
    /// Reporter config file (TOML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the output directory holding the history file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Recent runs considered for flaky detection
    #[arg(short, long)]
    pub window: Option<usize>,

    /// Most recent runs listed
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRow {
    pub index: usize,
    pub generated_at: String,
    pub browser: String,
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub pass_rate_pct: f64,
    pub duration_ms: f64,
}

impl RunRow {
    fn new(index: usize, entry: &HistoryRunEntry) -> Self {
        Self {
            index,
            generated_at: entry.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            browser: entry.browser_name.clone().unwrap_or_else(|| "-".into()),
            tests: entry.totals.tests,
            passed: entry.totals.passed,
            failed: entry.totals.failed,
            pass_rate_pct: pass_rate_pct(entry.totals.passed, entry.totals.tests),
            duration_ms: entry.totals.duration_ms,
        }
    }
}

impl TableDisplay for RunRow {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Finished", "Browser", "Tests", "Passed", "Failed", "Pass rate", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.generated_at.clone(),
            self.browser.clone(),
            self.tests.to_string(),
            self.passed.to_string(),
            self.failed.to_string(),
            format!("{:.2}%", self.pass_rate_pct),
            format_millis(self.duration_ms),
        ]
    }
}

impl TableDisplay for FlakyTestInsight {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Spec", "Passed", "Failed", "Runs", "Score"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.display_title.clone().unwrap_or_else(|| self.test_id.clone()),
            self.spec_relative.clone(),
            self.pass_count.to_string(),
            self.fail_count.to_string(),
            self.total_runs.to_string(),
            format!("{:.2}", self.flaky_score),
        ]
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserRow {
    pub browser: String,
    #[serde(flatten)]
    pub stats: BrowserStats,
}

impl TableDisplay for BrowserRow {
    fn headers() -> Vec<&'static str> {
        vec!["Browser", "Runs", "Avg duration", "Passed", "Failed"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.browser.clone(),
            self.stats.runs.to_string(),
            format_millis(self.stats.avg_duration_ms),
            self.stats.passed.to_string(),
            self.stats.failed.to_string(),
        ]
    }
}

/// Everything the command shows
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    pub path: PathBuf,
    pub total_runs: usize,
    pub runs: Vec<RunRow>,
    pub flaky_tests: Vec<FlakyTestInsight>,
    pub browsers: Vec<BrowserRow>,
}

/// Read the history once and derive the report
pub fn build(args: HistoryArgs) -> Result<HistoryReport> {
    let options = super::load_options(args.config.as_deref(), args.output_dir)?;
    let path = options.history_path();
    let window = args.window.unwrap_or(options.flaky_window).max(1);

    let history = history::read(&path);
    let skip = history.len().saturating_sub(args.limit);
    let runs = history
        .runs
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, entry)| RunRow::new(i, entry))
        .collect();
    let browsers = trends::cross_browser(&history)
        .into_iter()
        .map(|(browser, stats)| BrowserRow { browser, stats })
        .collect();

    Ok(HistoryReport {
        total_runs: history.len(),
        flaky_tests: flaky::detect(&history, window),
        runs,
        browsers,
        path,
    })
}

pub fn execute(args: HistoryArgs, format: OutputFormat) -> Result<()> {
    let report = build(args)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("{} run(s) in {}", report.total_runs, report.path.display());
            print_list("Runs", &report.runs, format);
            print_list("Flaky tests", &report.flaky_tests, format);
            print_list("Browsers", &report.browsers, format);
        }
    }
    Ok(())
}
