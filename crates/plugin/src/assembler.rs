//! Builds the final report from the framework results and the buckets

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use cynova_common::{
    BrowserInfo, CyNovaRun, MediaKind, PerformanceMetrics, SpecResult, TimelineEvent,
};

use crate::correlator::LogCorrelator;
use crate::raw;

/// What the reporter learned before `after:run`
#[derive(Debug, Clone, Default)]
pub struct RunMeta {
    pub browser: Option<BrowserInfo>,
    pub cypress_version: Option<String>,
    pub timeline: Vec<TimelineEvent>,
}

/// Assemble a run from raw `after:run` results
///
/// Buckets matched to a spec are moved into it. Buckets no spec claimed
/// are dropped; the ones holding logs are reported with a warning.
/// Totals are copied from the framework counters and may disagree with
/// the assembled tree.
pub fn assemble(results: &Value, buckets: &mut LogCorrelator, meta: RunMeta) -> CyNovaRun {
    let mut run = CyNovaRun::new(raw::totals(results));

    run.project_root = raw::str_at(results, "projectRoot").map(str::to_string);
    run.cypress_version = raw::str_at(results, "cypressVersion")
        .map(str::to_string)
        .or(meta.cypress_version);
    run.os = raw::os(results);
    run.browser = meta
        .browser
        .or_else(|| raw::browser_from_results(results));

    let mut known = BTreeSet::new();
    for raw_spec in raw::array_at(results, "runs") {
        let spec = assemble_spec(raw_spec, buckets);
        known.insert(spec.spec_relative.clone());
        run.specs.push(spec);
    }

    for orphan in buckets.unmatched_specs(&known) {
        match buckets.bucket(orphan) {
            Some(bucket) if bucket.has_logs() => warn!(
                "[CyNova] Dropping {} console / {} network entries for spec '{}' that is not in the run results",
                bucket.console.len(),
                bucket.network.len(),
                orphan
            ),
            _ => debug!("No results for spec '{}'", orphan),
        }
    }
    buckets.clear();

    run.performance = PerformanceMetrics {
        total_duration_ms: Some(run.totals.duration_ms),
        spec_durations_ms: run
            .specs
            .iter()
            .filter_map(|s| s.duration_ms.map(|d| (s.spec_relative.clone(), d)))
            .collect(),
        plugin_overhead_ms: None,
    };
    run.timeline = meta.timeline;

    debug!(
        "Assembled {} spec(s), {} test(s)",
        run.specs.len(),
        run.tests().count()
    );
    run
}

fn assemble_spec(raw_spec: &Value, buckets: &mut LogCorrelator) -> SpecResult {
    let spec = raw_spec.get("spec").unwrap_or(&Value::Null);
    let spec_relative = raw::spec_identity(spec);
    let bucket = buckets.take_bucket(&spec_relative).unwrap_or_default();

    let video = raw_spec
        .get("video")
        .and_then(|v| raw::media(v, MediaKind::Video));
    let tests = raw::array_at(raw_spec, "tests")
        .iter()
        .enumerate()
        .map(|(i, t)| raw::test(t, i, video.as_ref()))
        .collect();

    let raw_stats = raw_spec.get("stats").unwrap_or(&Value::Null);
    let duration_ms = raw::f64_at(raw_stats, "wallClockDuration")
        .or_else(|| raw::f64_at(raw_stats, "duration"))
        .or_else(|| bucket.observed_duration_ms());
    let stats = raw::object_at(raw_spec, "stats").cloned().unwrap_or_default();

    SpecResult {
        spec_absolute: raw::spec_absolute(spec),
        spec_relative,
        tests,
        screenshots: raw::screenshots(raw_spec, None),
        video,
        console: bucket.console,
        network: bucket.network,
        duration_ms,
        stats,
    }
}
