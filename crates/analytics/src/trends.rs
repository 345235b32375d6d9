//! Time series and per-browser aggregates across the merged history

use std::collections::BTreeSet;

use cynova_common::{pass_rate_pct, BrowserStats, CrossBrowserStats, TrendSeriesPoint, TrendsInsight};

use crate::history::CyNovaHistory;

/// Browser key used when a run did not record one
pub const UNKNOWN_BROWSER: &str = "unknown";

/// One series per metric over every run in `history`
///
/// Specs missing from a run contribute a 0 point so that every series has
/// one point per run.
pub fn compute(history: &CyNovaHistory) -> TrendsInsight {
    let point = |idx: usize, value: f64, run: &crate::history::HistoryRunEntry| TrendSeriesPoint {
        run_index: idx,
        value,
        timestamp: Some(run.generated_at),
    };

    let total_duration_ms = history
        .runs
        .iter()
        .enumerate()
        .map(|(idx, run)| point(idx, run.totals.duration_ms, run))
        .collect();

    let specs: BTreeSet<&String> = history
        .runs
        .iter()
        .flat_map(|run| run.spec_durations.keys())
        .collect();

    let spec_duration_ms = specs
        .into_iter()
        .map(|spec| {
            let series = history
                .runs
                .iter()
                .enumerate()
                .map(|(idx, run)| {
                    let value = run.spec_durations.get(spec).copied().flatten().unwrap_or(0.0);
                    point(idx, value, run)
                })
                .collect();
            (spec.clone(), series)
        })
        .collect();

    let pass_rate_pct = history
        .runs
        .iter()
        .enumerate()
        .map(|(idx, run)| point(idx, pass_rate_pct(run.totals.passed, run.totals.tests), run))
        .collect();

    TrendsInsight {
        total_duration_ms,
        spec_duration_ms,
        pass_rate_pct,
    }
}

/// Group runs by browser name
///
/// The average duration is maintained incrementally as
/// `avg' = (avg * (n - 1) + value) / n`.
pub fn cross_browser(history: &CyNovaHistory) -> CrossBrowserStats {
    let mut out = CrossBrowserStats::new();

    for run in &history.runs {
        let key = run
            .browser_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_BROWSER);
        let stats: &mut BrowserStats = out.entry(key.to_string()).or_default();

        stats.runs += 1;
        stats.passed += run.totals.passed;
        stats.failed += run.totals.failed;
        let n = f64::from(stats.runs);
        stats.avg_duration_ms = (stats.avg_duration_ms * (n - 1.0) + run.totals.duration_ms) / n;
    }

    out
}
