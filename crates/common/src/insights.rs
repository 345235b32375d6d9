//! Analytics insight types attached to a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Millis;

/// A test that both passed and failed inside the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakyTestInsight {
    pub test_id: String,
    pub spec_relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    pub pass_count: u32,
    pub fail_count: u32,
    pub total_runs: u32,
    /// 0..=1, higher is flakier
    pub flaky_score: f64,
}

/// A test whose duration sits far above the run mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationOutlierInsight {
    pub test_id: String,
    pub spec_relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    pub duration_ms: Millis,
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeriesPoint {
    /// 0-based position in history
    pub run_index: usize,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsInsight {
    pub total_duration_ms: Vec<TrendSeriesPoint>,
    pub spec_duration_ms: BTreeMap<String, Vec<TrendSeriesPoint>>,
    pub pass_rate_pct: Vec<TrendSeriesPoint>,
}

/// Aggregate for one browser across history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserStats {
    pub runs: u32,
    pub avg_duration_ms: f64,
    pub passed: u64,
    pub failed: u64,
}

/// Browser name -> aggregate
pub type CrossBrowserStats = BTreeMap<String, BrowserStats>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphInsight {
    /// specRelative -> dependency paths
    pub graph: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotDiffStatus {
    Computed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotDiffInsight {
    pub test_id: String,
    pub spec_relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pixels: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_pixels: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_ratio: Option<f64>,
    pub status: ScreenshotDiffStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScreenshotDiffInsight {
    pub fn skipped(test_id: &str, spec_relative: &str, baseline: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            spec_relative: spec_relative.to_string(),
            baseline_path: Some(baseline.to_string()),
            compare_path: None,
            diff_image_path: None,
            total_pixels: None,
            diff_pixels: None,
            diff_ratio: None,
            status: ScreenshotDiffStatus::Skipped,
            error_message: None,
        }
    }

    pub fn failed(
        test_id: &str,
        spec_relative: &str,
        baseline: &str,
        compare: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            compare_path: Some(compare.to_string()),
            status: ScreenshotDiffStatus::Error,
            error_message: Some(message.into()),
            ..Self::skipped(test_id, spec_relative, baseline)
        }
    }
}

/// Every insight is optional so one failed computation leaves the rest intact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyNovaAnalytics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flaky_tests: Option<Vec<FlakyTestInsight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_outliers: Option<Vec<DurationOutlierInsight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trends: Option<TrendsInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_browser: Option<CrossBrowserStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyGraphInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_diffs: Option<Vec<ScreenshotDiffInsight>>,
}
