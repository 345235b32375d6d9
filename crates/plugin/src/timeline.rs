//! Ordered event timeline for one run

use std::time::Instant;
use tracing::debug;

use cynova_common::{Millis, TimelineEvent, TimelineKind};

use crate::broadcast::Broadcaster;
use crate::correlator::LogCorrelator;

/// Records timeline events against a monotonic clock started at `run:start`
#[derive(Debug, Default)]
pub struct TimelineRecorder {
    started: Option<Instant>,
    events: Vec<TimelineEvent>,
}

impl TimelineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the clock; every later offset is relative to this instant
    pub fn mark_run_start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Milliseconds since run start, 0 before it
    pub fn elapsed_millis(&self) -> Millis {
        self.started
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// A new event of `kind` stamped with the current offset
    pub fn event(&self, kind: TimelineKind) -> TimelineEvent {
        TimelineEvent::new(kind, self.elapsed_millis())
    }

    /// Append to the run timeline and the event's spec bucket, then broadcast
    pub fn record(&mut self, event: TimelineEvent, buckets: &mut LogCorrelator, sink: &Broadcaster) {
        debug!("timeline {} @{:.1}ms", event.kind, event.at_millis);
        buckets.record_timeline(&event);
        sink.timeline(&event);
        self.events.push(event);
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Drain the recorded events, keeping the clock
    pub fn take(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Forget events and the clock
    pub fn reset(&mut self) {
        self.started = None;
        self.events.clear();
    }
}
