//! Append-only history of condensed run summaries
//!
//! The history file is read in full, extended by one entry and written back
//! on every run. There is no locking: two runs finishing at the same time
//! against the same file race and the last writer wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use cynova_common::{CyNovaRun, Millis, Result, TestState};

/// Current on-disk format version
pub const HISTORY_VERSION: u32 = 1;

/// Outcome of one test in one historical run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTestOutcome {
    pub test_id: String,
    pub spec_relative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TestState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Millis>,
}

/// Missing counters read as zero
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryTotals {
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    pub duration_ms: Millis,
}

/// Condensed summary of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRunEntry {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_name: Option<String>,
    #[serde(default)]
    pub totals: HistoryTotals,
    #[serde(default)]
    pub spec_durations: BTreeMap<String, Option<Millis>>,
    #[serde(default)]
    pub tests: Vec<HistoryTestOutcome>,
}

/// The whole history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyNovaHistory {
    pub version: u32,
    pub runs: Vec<HistoryRunEntry>,
}

impl Default for CyNovaHistory {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            runs: Vec::new(),
        }
    }
}

impl CyNovaHistory {
    /// A copy with `entry` appended
    pub fn merged_with(&self, entry: HistoryRunEntry) -> Self {
        let mut runs = self.runs.clone();
        runs.push(entry);
        Self {
            version: HISTORY_VERSION,
            runs,
        }
    }

    /// The `n` most recent runs, oldest first
    pub fn recent(&self, n: usize) -> &[HistoryRunEntry] {
        let start = self.runs.len().saturating_sub(n);
        &self.runs[start..]
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Read the history file
///
/// A missing file, unparseable JSON, or a `runs` field that is not an array
/// all yield a fresh empty history. Individual entries that do not decode
/// are skipped.
pub fn read(path: &Path) -> CyNovaHistory {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("No history at {} ({}), starting fresh", path.display(), e);
            return CyNovaHistory::default();
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!("History file {} is not valid JSON, starting fresh: {}", path.display(), e);
            return CyNovaHistory::default();
        }
    };

    let Some(raw_runs) = value.get("runs").and_then(Value::as_array) else {
        warn!("History file {} has no runs array, starting fresh", path.display());
        return CyNovaHistory::default();
    };

    let mut runs = Vec::with_capacity(raw_runs.len());
    for (idx, raw) in raw_runs.iter().enumerate() {
        match serde_json::from_value::<HistoryRunEntry>(raw.clone()) {
            Ok(entry) => runs.push(entry),
            Err(e) => warn!("Skipping unreadable history entry #{}: {}", idx, e),
        }
    }

    CyNovaHistory {
        version: HISTORY_VERSION,
        runs,
    }
}

/// Write the history file, creating parent directories
///
/// The content goes to a temporary sibling first and is then renamed over
/// the target, so a crash never leaves a half-written file behind.
pub fn write(path: &Path, history: &CyNovaHistory) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(history)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("History written to {} ({} runs)", path.display(), history.runs.len());
    Ok(())
}

/// Condense a full run into its history entry
///
/// Logs, media and error details are dropped; only identity, state and
/// durations survive.
pub fn to_history_entry(run: &CyNovaRun) -> HistoryRunEntry {
    let mut spec_durations = BTreeMap::new();
    let mut tests = Vec::new();

    for spec in &run.specs {
        spec_durations.insert(spec.spec_relative.clone(), spec.duration_ms);
        for test in &spec.tests {
            tests.push(HistoryTestOutcome {
                test_id: test.id.clone(),
                spec_relative: spec.spec_relative.clone(),
                display_title: Some(test.display_title.clone()),
                state: Some(test.state),
                duration_ms: test.best_duration_ms(),
            });
        }
    }

    HistoryRunEntry {
        generated_at: run.generated_at,
        browser_name: run.browser_name().map(str::to_string),
        totals: HistoryTotals {
            tests: run.totals.tests,
            passed: run.totals.passed,
            failed: run.totals.failed,
            duration_ms: run.totals.duration_ms,
        },
        spec_durations,
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynova_common::{RunTotals, SpecResult, TestResultNode};
    use tempfile::TempDir;

    fn run_with(test_state: TestState) -> CyNovaRun {
        let mut run = CyNovaRun::new(RunTotals {
            tests: 1,
            passed: u64::from(test_state == TestState::Passed),
            failed: u64::from(test_state == TestState::Failed),
            duration_ms: 120.0,
            ..Default::default()
        });
        run.specs.push(SpecResult {
            spec_relative: "cypress/e2e/x.cy.ts".into(),
            duration_ms: Some(120.0),
            tests: vec![TestResultNode {
                id: "t1".into(),
                title: vec!["suite".into(), "works".into()],
                display_title: "suite > works".into(),
                state: test_state,
                wall_clock_duration_ms: Some(100.0),
                ..Default::default()
            }],
            ..Default::default()
        });
        run
    }

    #[test]
    fn test_read_missing_file() {
        let tmp = TempDir::new().unwrap();
        let history = read(&tmp.path().join("cynova-history.json"));
        assert_eq!(history.version, 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_read_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova-history.json");

        std::fs::write(&path, "{not json").unwrap();
        assert!(read(&path).is_empty());

        std::fs::write(&path, r#"{"version": 1, "runs": {"a": 1}}"#).unwrap();
        assert!(read(&path).is_empty());
    }

    #[test]
    fn test_read_skips_bad_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova-history.json");
        let good = serde_json::to_value(to_history_entry(&run_with(TestState::Passed))).unwrap();
        let body = serde_json::json!({"version": 1, "runs": [good, {"generatedAt": 5}]});
        std::fs::write(&path, body.to_string()).unwrap();

        assert_eq!(read(&path).len(), 1);
    }

    #[test]
    fn test_read_keeps_entries_with_partial_totals() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova-history.json");
        let body = serde_json::json!({"version": 1, "runs": [{
            "generatedAt": "2024-05-01T10:00:00Z",
            "totals": {"tests": 2, "passed": 2}
        }]});
        std::fs::write(&path, body.to_string()).unwrap();

        let history = read(&path);
        assert_eq!(history.len(), 1);
        let totals = &history.runs[0].totals;
        assert_eq!((totals.tests, totals.passed, totals.failed), (2, 2, 0));
        assert_eq!(totals.duration_ms, 0.0);
    }

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/cynova-history.json");

        let history = CyNovaHistory::default()
            .merged_with(to_history_entry(&run_with(TestState::Passed)))
            .merged_with(to_history_entry(&run_with(TestState::Failed)));
        write(&path, &history).unwrap();

        assert_eq!(read(&path), history);
    }

    #[test]
    fn test_append_keeps_submission_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova-history.json");

        let states = [TestState::Passed, TestState::Failed, TestState::Skipped, TestState::Passed];
        for (n, state) in states.iter().enumerate() {
            let merged = read(&path).merged_with(to_history_entry(&run_with(*state)));
            write(&path, &merged).unwrap();
            assert_eq!(merged.len(), n + 1);
        }

        let history = read(&path);
        let recorded: Vec<_> = history.runs.iter().map(|r| r.tests[0].state).collect();
        assert_eq!(recorded, states.iter().copied().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_entry_condenses_run() {
        let entry = to_history_entry(&run_with(TestState::Failed));
        assert_eq!(entry.totals.tests, 1);
        assert_eq!(entry.totals.failed, 1);
        assert_eq!(entry.spec_durations.get("cypress/e2e/x.cy.ts"), Some(&Some(120.0)));
        assert_eq!(entry.tests[0].test_id, "t1");
        assert_eq!(entry.tests[0].duration_ms, Some(100.0));
        assert_eq!(entry.browser_name, None);
    }

    #[test]
    fn test_recent_window() {
        let mut history = CyNovaHistory::default();
        for _ in 0..12 {
            history = history.merged_with(to_history_entry(&run_with(TestState::Passed)));
        }
        assert_eq!(history.recent(10).len(), 10);
        assert_eq!(history.recent(50).len(), 12);
    }
}
