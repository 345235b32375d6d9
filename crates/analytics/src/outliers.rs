//! Duration outliers within the current run

use cynova_common::{CyNovaRun, DurationOutlierInsight};

/// Fewer numeric durations than this and no outliers are reported
pub const MIN_SAMPLES: usize = 5;

/// z-score at or above which a test is an outlier
pub const Z_THRESHOLD: f64 = 2.0;

/// Tests whose best available duration is at least two population standard
/// deviations above the run mean, highest z-score first
pub fn detect(run: &CyNovaRun) -> Vec<DurationOutlierInsight> {
    let samples: Vec<(&str, &str, &str, f64)> = run
        .tests()
        .filter_map(|(spec, test)| {
            test.best_duration_ms()
                .filter(|d| d.is_finite())
                .map(|d| (spec.spec_relative.as_str(), test.id.as_str(), test.display_title.as_str(), d))
        })
        .collect();

    if samples.len() < MIN_SAMPLES {
        return Vec::new();
    }

    let durations: Vec<f64> = samples.iter().map(|s| s.3).collect();
    let mean = mean(&durations);
    let mut sd = stddev(&durations, mean);
    if sd == 0.0 {
        sd = 1.0;
    }

    let mut outliers: Vec<DurationOutlierInsight> = samples
        .into_iter()
        .filter_map(|(spec, id, title, duration)| {
            let z = (duration - mean) / sd;
            (z >= Z_THRESHOLD).then(|| DurationOutlierInsight {
                test_id: id.to_string(),
                spec_relative: spec.to_string(),
                display_title: Some(title.to_string()),
                duration_ms: duration,
                z_score: z,
            })
        })
        .collect();

    outliers.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
    outliers
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynova_common::{RunTotals, SpecResult, TestAttempt, TestResultNode};

    fn run_with_durations(durations: &[Option<f64>]) -> CyNovaRun {
        let mut run = CyNovaRun::new(RunTotals::default());
        run.specs.push(SpecResult {
            spec_relative: "cypress/e2e/a.cy.ts".into(),
            tests: durations
                .iter()
                .enumerate()
                .map(|(i, d)| TestResultNode {
                    id: format!("t{i}"),
                    display_title: format!("test {i}"),
                    attempts: vec![TestAttempt {
                        duration_ms: *d,
                        ..Default::default()
                    }],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        run
    }

    #[test]
    fn test_below_floor_is_empty() {
        let run = run_with_durations(&[Some(1.0), Some(1.0), Some(1.0), Some(10_000.0), None, None]);
        assert!(detect(&run).is_empty());
    }

    #[test]
    fn test_detects_slow_test() {
        let mut durations = vec![Some(100.0); 9];
        durations.push(Some(1_000.0));
        let run = run_with_durations(&durations);

        let outliers = detect(&run);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].test_id, "t9");
        assert_eq!(outliers[0].duration_ms, 1_000.0);
        assert!(outliers[0].z_score >= Z_THRESHOLD);
    }

    #[test]
    fn test_constant_durations_have_no_outliers() {
        let run = run_with_durations(&[Some(50.0); 6]);
        assert!(detect(&run).is_empty());
    }

    #[test]
    fn test_sorted_by_z_descending() {
        let mut durations = vec![Some(10.0); 30];
        durations.push(Some(500.0));
        durations.push(Some(900.0));
        let run = run_with_durations(&durations);

        let outliers = detect(&run);
        assert_eq!(outliers.len(), 2);
        assert_eq!(outliers[0].duration_ms, 900.0);
        assert!(outliers[0].z_score > outliers[1].z_score);
    }

    #[test]
    fn test_population_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        assert_eq!(stddev(&values, m), 2.0);
    }
}
