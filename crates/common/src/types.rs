//! Core report types for CyNova
//!
//! Everything here serializes with camelCase field names, which is the
//! shape written to `cynova-summary.json` and embedded in the HTML report.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::insights::CyNovaAnalytics;

/// Milliseconds, fractional
pub type Millis = f64;

/// Tool name written into every report
pub const TOOL_NAME: &str = "CyNova";

/// Spec identity used when a log entry does not say which spec it belongs to
pub const UNKNOWN_SPEC: &str = "unknown";

/// Kind of a timeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineKind {
    #[serde(rename = "run:start")]
    RunStart,
    #[serde(rename = "run:end")]
    RunEnd,
    #[serde(rename = "spec:start")]
    SpecStart,
    #[serde(rename = "spec:end")]
    SpecEnd,
    #[serde(rename = "test:start")]
    TestStart,
    #[serde(rename = "test:end")]
    TestEnd,
    #[serde(rename = "custom")]
    Custom,
}

impl std::fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimelineKind::RunStart => write!(f, "run:start"),
            TimelineKind::RunEnd => write!(f, "run:end"),
            TimelineKind::SpecStart => write!(f, "spec:start"),
            TimelineKind::SpecEnd => write!(f, "spec:end"),
            TimelineKind::TestStart => write!(f, "test:start"),
            TimelineKind::TestEnd => write!(f, "test:end"),
            TimelineKind::Custom => write!(f, "custom"),
        }
    }
}

/// One entry on the run timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: TimelineKind,

    /// Offset from run start
    #[serde(default)]
    pub at_millis: Millis,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl TimelineEvent {
    pub fn new(kind: TimelineKind, at_millis: Millis) -> Self {
        Self {
            kind,
            at_millis: at_millis.max(0.0),
            spec: None,
            test_id: None,
            label: None,
            details: None,
        }
    }

    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }
}

/// Client-side console output captured during a spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLogEntry {
    #[serde(default = "default_console_level")]
    pub level: String,

    /// Non-string messages are kept as their JSON text
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub at_millis: Option<Millis>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    /// Fields the application attached that CyNova does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_console_level() -> String {
    "log".to_string()
}

/// A request/response pair observed by the browser
///
/// Browsers report headers with array or numeric values, so both header
/// maps are kept as raw JSON. Any other field with an unexpected type
/// decodes to `None` instead of rejecting the entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLogEntry {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Numeric strings such as `"404"` are accepted
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Millis>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<Map<String, Value>>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub at_millis: Option<Millis>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field of the wrong JSON type decodes to `None`
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_status<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Log records that belong to a spec bucket
pub trait SpecScoped {
    /// Spec identity the entry was reported under
    fn spec(&self) -> Option<&str>;

    /// Arrival offset, if the client supplied one
    fn at_millis(&self) -> Option<Millis>;

    fn set_at_millis(&mut self, at: Millis);
}

impl SpecScoped for ConsoleLogEntry {
    fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    fn at_millis(&self) -> Option<Millis> {
        self.at_millis
    }

    fn set_at_millis(&mut self, at: Millis) {
        self.at_millis = Some(at);
    }
}

impl SpecScoped for NetworkLogEntry {
    fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    fn at_millis(&self) -> Option<Millis> {
        self.at_millis
    }

    fn set_at_millis(&mut self, at: Millis) {
        self.at_millis = Some(at);
    }
}

impl SpecScoped for TimelineEvent {
    fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    fn at_millis(&self) -> Option<Millis> {
        Some(self.at_millis)
    }

    fn set_at_millis(&mut self, at: Millis) {
        self.at_millis = at.max(0.0);
    }
}

/// Media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Screenshot,
    Video,
}

/// Reference to a screenshot or video on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl MediaRef {
    pub fn screenshot(path: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Screenshot,
            path: path.into(),
            test_id: None,
            width: None,
            height: None,
            size_bytes: None,
        }
    }

    pub fn video(path: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            ..Self::screenshot(path)
        }
    }
}

/// Browser the run executed in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_headless: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_headed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Host operating system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// Outcome of a test or attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Passed,
    Failed,
    Pending,
    Skipped,
    #[default]
    Unknown,
}

impl TestState {
    /// Map a framework state string; anything unrecognized is `Unknown`
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "passed" => TestState::Passed,
            "failed" => TestState::Failed,
            "pending" => TestState::Pending,
            "skipped" => TestState::Skipped,
            _ => TestState::Unknown,
        }
    }
}

impl std::fmt::Display for TestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestState::Passed => write!(f, "passed"),
            TestState::Failed => write!(f, "failed"),
            TestState::Pending => write!(f, "pending"),
            TestState::Skipped => write!(f, "skipped"),
            TestState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Error raised by an attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// One execution of a test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    pub attempt: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TestState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Millis>,

    #[serde(default)]
    pub screenshots: Vec<MediaRef>,

    #[serde(default)]
    pub videos: Vec<MediaRef>,
}

/// A test and all of its attempts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultNode {
    pub id: String,

    /// Suite path segments followed by the test title
    pub title: Vec<String>,

    pub display_title: String,

    #[serde(default)]
    pub state: TestState,

    #[serde(default)]
    pub attempts: Vec<TestAttempt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_clock_started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_clock_duration_ms: Option<Millis>,
}

impl TestResultNode {
    /// Overall duration, else the first attempt's duration
    pub fn best_duration_ms(&self) -> Option<Millis> {
        self.wall_clock_duration_ms
            .or_else(|| self.attempts.first().and_then(|a| a.duration_ms))
    }
}

/// Everything CyNova knows about one spec file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecResult {
    pub spec_relative: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_absolute: Option<String>,

    #[serde(default)]
    pub tests: Vec<TestResultNode>,

    #[serde(default)]
    pub screenshots: Vec<MediaRef>,

    #[serde(default)]
    pub video: Option<MediaRef>,

    #[serde(default)]
    pub console: Vec<ConsoleLogEntry>,

    #[serde(default)]
    pub network: Vec<NetworkLogEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Millis>,

    #[serde(default)]
    pub stats: Map<String, Value>,
}

/// Run-level counters as reported by the test framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub pending: u64,
    pub skipped: u64,
    pub duration_ms: Millis,
}

impl RunTotals {
    /// Passed / total as a percentage rounded to two decimals
    pub fn pass_rate_pct(&self) -> f64 {
        pass_rate_pct(self.passed, self.tests)
    }
}

/// Percentage of passed tests, 0 when there are no tests
pub fn pass_rate_pct(passed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = (passed.min(total) as f64 / total as f64) * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Timing information about the run and the reporter itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<Millis>,

    #[serde(default)]
    pub spec_durations_ms: BTreeMap<String, Millis>,

    /// Time spent assembling the report at run end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_overhead_ms: Option<Millis>,
}

/// The final report for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyNovaRun {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cypress_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsInfo>,

    pub totals: RunTotals,

    #[serde(default)]
    pub specs: Vec<SpecResult>,

    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,

    #[serde(default)]
    pub performance: PerformanceMetrics,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<CyNovaAnalytics>,
}

impl CyNovaRun {
    /// An empty run stamped now
    pub fn new(totals: RunTotals) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            project_root: None,
            browser: None,
            cypress_version: None,
            os: None,
            totals,
            specs: Vec::new(),
            timeline: Vec::new(),
            performance: PerformanceMetrics::default(),
            analytics: None,
        }
    }

    pub fn browser_name(&self) -> Option<&str> {
        self.browser.as_ref().and_then(|b| b.name.as_deref())
    }

    /// Iterate `(spec, test)` pairs across the whole run
    pub fn tests(&self) -> impl Iterator<Item = (&SpecResult, &TestResultNode)> {
        self.specs
            .iter()
            .flat_map(|spec| spec.tests.iter().map(move |test| (spec, test)))
    }
}
