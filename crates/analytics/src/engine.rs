//! Ties history and the individual insights together

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use cynova_common::{CyNovaAnalytics, CyNovaOptions, CyNovaRun, DependencyGraphInsight};
use serde_json::Value;

use crate::flaky::{self, DEFAULT_FLAKY_WINDOW};
use crate::history::{self, CyNovaHistory};
use crate::outliers;
use crate::trends;
use crate::visual::ScreenshotDiffer;

/// Computes insights for a finished run and maintains the history file
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    history_path: PathBuf,
    flaky_window: usize,
    differ: ScreenshotDiffer,
}

impl AnalyticsEngine {
    pub fn new(history_path: PathBuf, flaky_window: usize, differ: ScreenshotDiffer) -> Self {
        Self {
            history_path,
            flaky_window: flaky_window.max(1),
            differ,
        }
    }

    /// Engine writing history and diffs under the configured output directory
    pub fn from_options(options: &CyNovaOptions) -> Self {
        Self::new(
            options.history_path(),
            options.flaky_window,
            ScreenshotDiffer::resolve(options.diff_dir()),
        )
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Read history, merge the run into it, compute insights, persist the merge
    ///
    /// The merged value is what gets written; history is not re-read. A
    /// failed history write is logged and the insights are still returned.
    pub fn compute(&self, run: &CyNovaRun) -> CyNovaAnalytics {
        let previous = history::read(&self.history_path);
        let merged = previous.merged_with(history::to_history_entry(run));
        debug!(
            "Computing analytics over {} run(s) of history",
            merged.len()
        );

        let analytics = self.insights(run, &merged);

        match history::write(&self.history_path, &merged) {
            Ok(()) => info!(
                "History updated at {} ({} runs)",
                self.history_path.display(),
                merged.len()
            ),
            Err(e) => warn!(
                "Failed to write history {}: {}",
                self.history_path.display(),
                e
            ),
        }

        analytics
    }

    /// Every insight for `run` given an already merged history
    pub fn insights(&self, run: &CyNovaRun, merged: &CyNovaHistory) -> CyNovaAnalytics {
        CyNovaAnalytics {
            flaky_tests: Some(flaky::detect(merged, self.flaky_window)),
            duration_outliers: Some(outliers::detect(run)),
            trends: Some(trends::compute(merged)),
            cross_browser: Some(trends::cross_browser(merged)),
            dependencies: Some(dependencies(run)),
            screenshot_diffs: Some(self.differ.diff_run(run)),
        }
    }
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        let options = CyNovaOptions::default();
        Self::new(options.history_path(), DEFAULT_FLAKY_WINDOW, ScreenshotDiffer::resolve(options.diff_dir()))
    }
}

/// Per-spec dependency lists taken verbatim from `stats.deps` when present
pub fn dependencies(run: &CyNovaRun) -> DependencyGraphInsight {
    let graph = run
        .specs
        .iter()
        .map(|spec| {
            let deps = spec
                .stats
                .get("deps")
                .and_then(Value::as_array)
                .map(|deps| {
                    deps.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            (spec.spec_relative.clone(), deps)
        })
        .collect();

    DependencyGraphInsight { graph }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynova_common::{RunTotals, SpecResult};
    use serde_json::json;

    #[test]
    fn test_dependencies_from_stats() {
        let mut run = CyNovaRun::new(RunTotals::default());
        let mut stats = serde_json::Map::new();
        stats.insert("deps".into(), json!(["support/e2e.ts", 7, "fixtures/user.json"]));
        run.specs.push(SpecResult {
            spec_relative: "a.cy.ts".into(),
            stats,
            ..Default::default()
        });
        run.specs.push(SpecResult {
            spec_relative: "b.cy.ts".into(),
            ..Default::default()
        });

        let deps = dependencies(&run);
        assert_eq!(deps.graph["a.cy.ts"], vec!["support/e2e.ts", "fixtures/user.json"]);
        assert!(deps.graph["b.cy.ts"].is_empty());
    }
}
