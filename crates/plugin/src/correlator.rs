//! Per-spec buckets of client-reported logs

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use cynova_common::{
    ConsoleLogEntry, Millis, NetworkLogEntry, SpecScoped, TimelineEvent, TimelineKind, UNKNOWN_SPEC,
};

use crate::broadcast::Broadcaster;

pub const CONSOLE_TASK: &str = "cynova:console";
pub const NETWORK_TASK: &str = "cynova:network";
pub const TIMELINE_TASK: &str = "cynova:timeline";

/// Everything reported for one spec outside the framework results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecExtrasBucket {
    pub console: Vec<ConsoleLogEntry>,
    pub network: Vec<NetworkLogEntry>,
    pub timeline: Vec<TimelineEvent>,
}

impl SpecExtrasBucket {
    pub fn has_logs(&self) -> bool {
        !self.console.is_empty() || !self.network.is_empty()
    }

    /// Time between the first `spec:start` and the last `spec:end`
    pub fn observed_duration_ms(&self) -> Option<Millis> {
        let start = self
            .timeline
            .iter()
            .find(|e| e.kind == TimelineKind::SpecStart)?;
        let end = self
            .timeline
            .iter()
            .rev()
            .find(|e| e.kind == TimelineKind::SpecEnd)?;
        Some((end.at_millis - start.at_millis).max(0.0))
    }
}

fn spec_key(spec: Option<&str>) -> String {
    spec.filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_SPEC)
        .to_string()
}

fn stamp<T: SpecScoped>(entry: &mut T, now: Millis) {
    if entry.at_millis().is_none() {
        entry.set_at_millis(now);
    }
}

/// Buckets keyed by spec identity, created on first use
#[derive(Debug, Default)]
pub struct LogCorrelator {
    buckets: BTreeMap<String, SpecExtrasBucket>,
}

impl LogCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, spec: Option<&str>) -> &mut SpecExtrasBucket {
        self.buckets.entry(spec_key(spec)).or_default()
    }

    pub fn record_console(&mut self, mut entry: ConsoleLogEntry, now: Millis, sink: &Broadcaster) {
        stamp(&mut entry, now);
        sink.task(CONSOLE_TASK, &entry);
        debug!("console[{}] {}", entry.level, entry.message);
        let key = spec_key(entry.spec());
        self.buckets.entry(key).or_default().console.push(entry);
    }

    pub fn record_network(&mut self, mut entry: NetworkLogEntry, now: Millis, sink: &Broadcaster) {
        stamp(&mut entry, now);
        sink.task(NETWORK_TASK, &entry);
        debug!(
            "network {} {}",
            entry.method.as_deref().unwrap_or("-"),
            entry.url.as_deref().unwrap_or("-")
        );
        let key = spec_key(entry.spec());
        self.buckets.entry(key).or_default().network.push(entry);
    }

    /// Spec-tagged timeline events are also kept on their bucket
    pub fn record_timeline(&mut self, event: &TimelineEvent) {
        if let Some(spec) = event.spec.as_deref() {
            self.bucket_mut(Some(spec)).timeline.push(event.clone());
        }
    }

    pub fn bucket(&self, spec: &str) -> Option<&SpecExtrasBucket> {
        self.buckets.get(spec)
    }

    pub fn take_bucket(&mut self, spec: &str) -> Option<SpecExtrasBucket> {
        self.buckets.remove(spec)
    }

    /// Bucket identities not present in `known`
    pub fn unmatched_specs<'a>(&'a self, known: &BTreeSet<String>) -> Vec<&'a str> {
        self.buckets
            .keys()
            .filter(|spec| !known.contains(*spec))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn console(spec: Option<&str>, at: Option<f64>) -> ConsoleLogEntry {
        serde_json::from_value(json!({
            "level": "info",
            "message": "hello",
            "spec": spec,
            "atMillis": at,
        }))
        .unwrap()
    }

    #[test]
    fn test_entries_land_on_their_spec() {
        let mut c = LogCorrelator::new();
        let sink = Broadcaster::Disabled;

        c.record_console(console(Some("a.cy.ts"), None), 5.0, &sink);
        c.record_network(
            NetworkLogEntry {
                method: Some("GET".into()),
                spec: Some("a.cy.ts".into()),
                ..Default::default()
            },
            6.0,
            &sink,
        );
        c.record_console(console(None, Some(1.5)), 7.0, &sink);

        let a = c.bucket("a.cy.ts").unwrap();
        assert_eq!(a.console.len(), 1);
        assert_eq!(a.console[0].at_millis, Some(5.0));
        assert_eq!(a.network[0].at_millis, Some(6.0));

        let unknown = c.bucket(UNKNOWN_SPEC).unwrap();
        assert_eq!(unknown.console[0].at_millis, Some(1.5));
    }

    #[test]
    fn test_unmatched_specs() {
        let mut c = LogCorrelator::new();
        let sink = Broadcaster::Disabled;
        c.record_console(console(Some("a.cy.ts"), None), 0.0, &sink);
        c.record_console(console(Some("/abs/b.cy.ts"), None), 0.0, &sink);

        let known: BTreeSet<String> = ["a.cy.ts".to_string()].into_iter().collect();
        assert_eq!(c.unmatched_specs(&known), vec!["/abs/b.cy.ts"]);

        assert!(c.take_bucket("a.cy.ts").is_some());
        assert!(c.take_bucket("a.cy.ts").is_none());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_observed_duration_from_bucket_timeline() {
        let mut c = LogCorrelator::new();
        c.record_timeline(&TimelineEvent::new(TimelineKind::SpecStart, 10.0).with_spec("a.cy.ts"));
        c.record_timeline(&TimelineEvent::new(TimelineKind::Custom, 20.0).with_spec("a.cy.ts"));
        c.record_timeline(&TimelineEvent::new(TimelineKind::SpecEnd, 60.0).with_spec("a.cy.ts"));
        c.record_timeline(&TimelineEvent::new(TimelineKind::RunStart, 0.0));

        let bucket = c.bucket("a.cy.ts").unwrap();
        assert_eq!(bucket.timeline.len(), 3);
        assert!(!bucket.has_logs());
        assert_eq!(bucket.observed_duration_ms(), Some(50.0));
        assert_eq!(c.len(), 1);
    }
}
