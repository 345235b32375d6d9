//! Flaky test detection over the recent history window

use std::collections::BTreeMap;

use cynova_common::{FlakyTestInsight, TestState};

use crate::history::CyNovaHistory;

/// Default number of most recent runs to inspect
pub const DEFAULT_FLAKY_WINDOW: usize = 10;

#[derive(Default)]
struct Tally {
    display_title: Option<String>,
    pass: u32,
    fail: u32,
    total: u32,
}

/// Tests with at least one pass and one failure among the last `window` runs
///
/// Identity is `(specRelative, testId)`. The score is
/// `min(1, (pass + fail) / totalRuns)`, which saturates at 1 whenever every
/// observed outcome was a pass or a failure. Sorted by score, then by number
/// of observed runs, both descending.
pub fn detect(history: &CyNovaHistory, window: usize) -> Vec<FlakyTestInsight> {
    let mut tallies: BTreeMap<(String, String), Tally> = BTreeMap::new();

    for run in history.recent(window) {
        for test in &run.tests {
            let tally = tallies
                .entry((test.spec_relative.clone(), test.test_id.clone()))
                .or_default();
            if tally.display_title.is_none() {
                tally.display_title = test.display_title.clone();
            }
            match test.state {
                Some(TestState::Passed) => tally.pass += 1,
                Some(TestState::Failed) => tally.fail += 1,
                _ => {}
            }
            tally.total += 1;
        }
    }

    let mut flaky: Vec<FlakyTestInsight> = tallies
        .into_iter()
        .filter(|(_, t)| t.pass > 0 && t.fail > 0)
        .map(|((spec_relative, test_id), t)| FlakyTestInsight {
            test_id,
            spec_relative,
            display_title: t.display_title,
            pass_count: t.pass,
            fail_count: t.fail,
            total_runs: t.total,
            flaky_score: (f64::from(t.pass + t.fail) / f64::from(t.total)).min(1.0),
        })
        .collect();

    flaky.sort_by(|a, b| {
        b.flaky_score
            .total_cmp(&a.flaky_score)
            .then_with(|| b.total_runs.cmp(&a.total_runs))
    });
    flaky
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryRunEntry, HistoryTestOutcome};
    use chrono::Utc;

    fn entry(outcomes: &[(&str, &str, TestState)]) -> HistoryRunEntry {
        HistoryRunEntry {
            generated_at: Utc::now(),
            browser_name: None,
            totals: Default::default(),
            spec_durations: Default::default(),
            tests: outcomes
                .iter()
                .map(|(spec, id, state)| HistoryTestOutcome {
                    test_id: id.to_string(),
                    spec_relative: spec.to_string(),
                    display_title: None,
                    state: Some(*state),
                    duration_ms: None,
                })
                .collect(),
        }
    }

    fn history(runs: Vec<HistoryRunEntry>) -> CyNovaHistory {
        runs.into_iter()
            .fold(CyNovaHistory::default(), |h, r| h.merged_with(r))
    }

    const X: &str = "cypress/e2e/x.cy.ts";

    #[test]
    fn test_pass_then_fail_is_flaky() {
        let h = history(vec![
            entry(&[(X, "t1", TestState::Passed)]),
            entry(&[(X, "t1", TestState::Failed)]),
        ]);

        let flaky = detect(&h, DEFAULT_FLAKY_WINDOW);
        assert_eq!(flaky.len(), 1);
        assert_eq!(flaky[0].test_id, "t1");
        assert_eq!(flaky[0].spec_relative, X);
        assert_eq!(flaky[0].pass_count, 1);
        assert_eq!(flaky[0].fail_count, 1);
        assert_eq!(flaky[0].flaky_score, 1.0);
    }

    #[test]
    fn test_single_outcome_never_flaky() {
        let h = history(vec![
            entry(&[(X, "ok", TestState::Passed), (X, "bad", TestState::Failed)]),
            entry(&[(X, "ok", TestState::Passed), (X, "bad", TestState::Failed)]),
        ]);
        assert!(detect(&h, DEFAULT_FLAKY_WINDOW).is_empty());
    }

    #[test]
    fn test_same_id_in_different_specs_is_distinct() {
        let h = history(vec![
            entry(&[(X, "t1", TestState::Passed), ("y.cy.ts", "t1", TestState::Failed)]),
            entry(&[(X, "t1", TestState::Passed), ("y.cy.ts", "t1", TestState::Failed)]),
        ]);
        assert!(detect(&h, DEFAULT_FLAKY_WINDOW).is_empty());
    }

    #[test]
    fn test_window_drops_oldest() {
        let mut runs = vec![entry(&[(X, "t1", TestState::Failed)])];
        runs.extend((0..3).map(|_| entry(&[(X, "t1", TestState::Passed)])));
        let h = history(runs);

        assert_eq!(detect(&h, 4).len(), 1);
        assert!(detect(&h, 3).is_empty());
    }

    #[test]
    fn test_skipped_runs_lower_score_and_ordering() {
        let h = history(vec![
            entry(&[(X, "a", TestState::Passed), (X, "b", TestState::Passed)]),
            entry(&[(X, "a", TestState::Failed), (X, "b", TestState::Failed)]),
            entry(&[(X, "a", TestState::Skipped), (X, "b", TestState::Passed)]),
        ]);

        let flaky = detect(&h, DEFAULT_FLAKY_WINDOW);
        assert_eq!(flaky.len(), 2);
        assert_eq!(flaky[0].test_id, "b");
        assert_eq!(flaky[0].flaky_score, 1.0);
        assert_eq!(flaky[1].test_id, "a");
        assert!((flaky[1].flaky_score - 2.0 / 3.0).abs() < 1e-9);
    }
}
