//! The reporter context driven by the test framework's hooks
//!
//! One [`Reporter`] per run. Hooks never fail and never panic on malformed
//! input: bad payloads are logged and dropped, failed writes are logged and
//! the hook returns normally.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use cynova_analytics::AnalyticsEngine;
use cynova_common::{
    BrowserInfo, ConsoleLogEntry, CyNovaOptions, CyNovaRun, LiveMessage, NetworkLogEntry, Result,
    TimelineEvent, TimelineKind,
};
use cynova_report::{write_html, write_json, HtmlRenderer};

use crate::assembler::{self, RunMeta};
use crate::broadcast::Broadcaster;
use crate::correlator::{LogCorrelator, CONSOLE_TASK, NETWORK_TASK, TIMELINE_TASK};
use crate::raw;
use crate::timeline::TimelineRecorder;

/// Mutable per-run state behind the reporter's lock
#[derive(Debug)]
struct RunState {
    timeline: TimelineRecorder,
    correlator: LogCorrelator,
    browser: Option<BrowserInfo>,
    cypress_version: Option<String>,
    broadcaster: Broadcaster,
}

impl RunState {
    fn record(&mut self, event: TimelineEvent) {
        self.timeline
            .record(event, &mut self.correlator, &self.broadcaster);
    }
}

/// Explicit run context shared by every hook
#[derive(Debug)]
pub struct Reporter {
    options: CyNovaOptions,
    renderer: Option<HtmlRenderer>,
    engine: AnalyticsEngine,
    state: Mutex<RunState>,
}

impl Reporter {
    /// Resolve every optional capability once and build the context
    ///
    /// The live server needs a tokio runtime reachable from this thread.
    pub fn new(options: CyNovaOptions) -> Self {
        if let Err(e) = options.validate() {
            warn!("[CyNova] {}; writes may fail", e);
        }

        let renderer = options
            .generate_html
            .then(|| HtmlRenderer::from_options(&options));
        let engine = AnalyticsEngine::from_options(&options);
        let broadcaster = Broadcaster::resolve(&options.live_server);

        Self {
            options,
            renderer,
            engine,
            state: Mutex::new(RunState {
                timeline: TimelineRecorder::new(),
                correlator: LogCorrelator::new(),
                browser: None,
                cypress_version: None,
                broadcaster,
            }),
        }
    }

    pub fn options(&self) -> &CyNovaOptions {
        &self.options
    }

    /// Address of the live server, when one is running
    pub fn live_addr(&self) -> Option<SocketAddr> {
        self.state.lock().broadcaster.local_addr()
    }

    pub fn live_observers(&self) -> usize {
        self.state.lock().broadcaster.observers()
    }

    /// Recorded timeline so far
    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.state.lock().timeline.events().to_vec()
    }

    /// `before:run`: start the clock and remember run details
    pub fn before_run(&self, details: &Value) {
        let mut state = self.state.lock();
        state.timeline.reset();
        state.correlator.clear();
        state.timeline.mark_run_start();

        state.cypress_version = raw::str_at(details, "cypressVersion")
            .or_else(|| details.get("config").and_then(|c| raw::str_at(c, "version")))
            .map(str::to_string);
        state.browser = details.get("browser").and_then(raw::browser);

        let event = state.timeline.event(TimelineKind::RunStart);
        state.record(event);
        state.broadcaster.lifecycle("before:run", None, None);
        debug!("Run started");
    }

    /// `before:browser:launch`: capture the browser, pass options through
    pub fn before_browser_launch(&self, browser: &Value, launch_options: Value) -> Value {
        let mut state = self.state.lock();
        if let Some(info) = raw::browser(browser) {
            debug!(
                "Browser {} {}",
                info.name.as_deref().unwrap_or("unknown"),
                info.version.as_deref().unwrap_or("")
            );
            state.browser = Some(info);
        }
        state
            .broadcaster
            .lifecycle("before:browser:launch", None, Some(browser.clone()));
        launch_options
    }

    /// `before:spec`
    pub fn before_spec(&self, spec: &Value) {
        let identity = raw::spec_identity(spec);
        let mut state = self.state.lock();
        let event = state
            .timeline
            .event(TimelineKind::SpecStart)
            .with_spec(identity.as_str());
        state.record(event);
        state
            .broadcaster
            .lifecycle("before:spec", Some(&identity), None);
    }

    /// `after:spec`; the spec's stats ride along as event details
    pub fn after_spec(&self, spec: &Value, results: &Value) {
        let identity = raw::spec_identity(spec);
        let mut state = self.state.lock();
        let mut event = state
            .timeline
            .event(TimelineKind::SpecEnd)
            .with_spec(identity.as_str());
        event.details = raw::object_at(results, "stats").cloned();
        state.record(event);
        state
            .broadcaster
            .lifecycle("after:spec", Some(&identity), None);
    }

    /// A `cy.task` call
    ///
    /// Known tasks acknowledge with `Some(null)` even when the payload is
    /// dropped; unknown names return `None` so another handler can claim them.
    pub fn task(&self, name: &str, payload: Value) -> Option<Value> {
        match name {
            CONSOLE_TASK => match serde_json::from_value::<ConsoleLogEntry>(payload) {
                Ok(entry) => {
                    let mut state = self.state.lock();
                    let now = state.timeline.elapsed_millis();
                    let RunState {
                        correlator,
                        broadcaster,
                        ..
                    } = &mut *state;
                    correlator.record_console(entry, now, broadcaster);
                }
                Err(e) => warn!("[CyNova] Dropping malformed {} payload: {}", name, e),
            },
            NETWORK_TASK => match serde_json::from_value::<NetworkLogEntry>(payload) {
                Ok(entry) => {
                    let mut state = self.state.lock();
                    let now = state.timeline.elapsed_millis();
                    let RunState {
                        correlator,
                        broadcaster,
                        ..
                    } = &mut *state;
                    correlator.record_network(entry, now, broadcaster);
                }
                Err(e) => warn!("[CyNova] Dropping malformed {} payload: {}", name, e),
            },
            TIMELINE_TASK => match custom_event(payload) {
                Ok((mut event, supplied_at)) => {
                    let mut state = self.state.lock();
                    if !supplied_at {
                        event.at_millis = state.timeline.elapsed_millis();
                    }
                    state.record(event);
                }
                Err(e) => warn!("[CyNova] Dropping malformed {} payload: {}", name, e),
            },
            _ => return None,
        }
        Some(Value::Null)
    }

    /// `after:run`: assemble, analyse, write and broadcast the report
    ///
    /// Always returns the assembled run, even when nothing could be written.
    pub fn after_run(&self, results: &Value) -> CyNovaRun {
        let started = Instant::now();

        let mut run = {
            let mut state = self.state.lock();
            let event = state.timeline.event(TimelineKind::RunEnd);
            state.record(event);
            state.broadcaster.lifecycle("after:run", None, None);

            let meta = RunMeta {
                browser: state.browser.clone(),
                cypress_version: state.cypress_version.clone(),
                timeline: state.timeline.take(),
            };
            assembler::assemble(results, &mut state.correlator, meta)
        };

        run.analytics = Some(self.engine.compute(&run));
        run.performance.plugin_overhead_ms = Some(started.elapsed().as_secs_f64() * 1000.0);

        self.write_outputs(&run);

        self.state.lock().broadcaster.send(LiveMessage::Summary {
            run: Box::new(run.clone()),
        });
        run
    }

    fn write_outputs(&self, run: &CyNovaRun) {
        if let Err(e) = write_json(run, &self.options.output_dir, &self.options.file_name) {
            error!(
                "[CyNova] Failed to write summary {}: {}",
                self.options.summary_path().display(),
                e
            );
        }

        if let Some(renderer) = &self.renderer {
            let path = self.options.html_path();
            if let Err(e) = write_html(run, renderer, &path) {
                error!("[CyNova] Failed to write HTML report {}: {}", path.display(), e);
            }
        }
    }

    /// Drive the matching hook for a recorded event
    pub fn dispatch(&self, event: InboundEvent) -> Outcome {
        match event {
            InboundEvent::BeforeRun(details) => {
                self.before_run(&details);
                Outcome::Done
            }
            InboundEvent::BeforeBrowserLaunch {
                browser,
                launch_options,
            } => Outcome::LaunchOptions(self.before_browser_launch(&browser, launch_options)),
            InboundEvent::BeforeSpec(spec) => {
                self.before_spec(&spec);
                Outcome::Done
            }
            InboundEvent::AfterSpec { spec, results } => {
                self.after_spec(&spec, &results);
                Outcome::Done
            }
            InboundEvent::Task { name, arg } => Outcome::TaskAck(self.task(&name, arg)),
            InboundEvent::AfterRun(results) => Outcome::Finished(Box::new(self.after_run(&results))),
        }
    }

    /// Stop the live server, if any
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.broadcaster.is_live() {
            info!("[CyNova] Live server stopped");
        }
        state.broadcaster.shutdown();
    }
}

/// Decode a client timeline event; `type` defaults to `custom`
fn custom_event(payload: Value) -> serde_json::Result<(TimelineEvent, bool)> {
    let mut payload = payload;
    let supplied_at = payload.get("atMillis").and_then(Value::as_f64).is_some();
    if let Value::Object(map) = &mut payload {
        map.entry("type")
            .or_insert_with(|| Value::String(TimelineKind::Custom.to_string()));
    }
    let mut event: TimelineEvent = serde_json::from_value(payload)?;
    event.at_millis = event.at_millis.max(0.0);
    Ok((event, supplied_at))
}

/// A recorded hook invocation, one per NDJSON line
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    BeforeRun(Value),
    BeforeBrowserLaunch { browser: Value, launch_options: Value },
    BeforeSpec(Value),
    AfterSpec { spec: Value, results: Value },
    Task { name: String, arg: Value },
    AfterRun(Value),
}

/// What a dispatched event produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    LaunchOptions(Value),
    TaskAck(Option<Value>),
    Finished(Box<CyNovaRun>),
}

#[derive(Debug, Deserialize)]
struct EventLine {
    event: String,
    #[serde(default)]
    payload: Value,
}

impl InboundEvent {
    /// Parse `{"event": "...", "payload": ...}`
    ///
    /// `cynova:*` event names are shorthand for a task whose argument is
    /// the payload.
    pub fn parse_line(line: &str) -> Result<Self> {
        let EventLine { event, payload } = serde_json::from_str(line)?;
        let field = |key: &str| payload.get(key).cloned().unwrap_or(Value::Null);

        let parsed = match event.as_str() {
            "before:run" => InboundEvent::BeforeRun(payload),
            "before:browser:launch" => InboundEvent::BeforeBrowserLaunch {
                browser: field("browser"),
                launch_options: field("launchOptions"),
            },
            "before:spec" => InboundEvent::BeforeSpec(field("spec")),
            "after:spec" => InboundEvent::AfterSpec {
                spec: field("spec"),
                results: field("results"),
            },
            "task" => InboundEvent::Task {
                name: raw::str_at(&payload, "name").unwrap_or_default().to_string(),
                arg: field("arg"),
            },
            "after:run" => InboundEvent::AfterRun(payload),
            name if name.starts_with("cynova:") => InboundEvent::Task {
                name: name.to_string(),
                arg: payload,
            },
            other => {
                return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                    "unknown event '{}'",
                    other
                ))
                .into())
            }
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(r#"{"event":"before:run","payload":{"cypressVersion":"13.5.0"}}"#, "before:run")]
    #[test_case(r#"{"event":"before:spec","payload":{"spec":{"relative":"a.cy.ts"}}}"#, "before:spec")]
    #[test_case(r#"{"event":"task","payload":{"name":"cynova:console","arg":{"message":"m"}}}"#, "task")]
    #[test_case(r#"{"event":"cynova:network","payload":{"url":"/api"}}"#, "task")]
    #[test_case(r#"{"event":"after:run"}"#, "after:run")]
    fn test_parse_line(line: &str, kind: &str) {
        let event = InboundEvent::parse_line(line).unwrap();
        let actual = match event {
            InboundEvent::BeforeRun(_) => "before:run",
            InboundEvent::BeforeBrowserLaunch { .. } => "before:browser:launch",
            InboundEvent::BeforeSpec(_) => "before:spec",
            InboundEvent::AfterSpec { .. } => "after:spec",
            InboundEvent::Task { .. } => "task",
            InboundEvent::AfterRun(_) => "after:run",
        };
        assert_eq!(actual, kind);
    }

    #[test]
    fn test_parse_line_rejects_unknown_events() {
        assert!(InboundEvent::parse_line(r#"{"event":"after:screenshot"}"#).is_err());
        assert!(InboundEvent::parse_line("not json").is_err());
    }

    #[test]
    fn test_spec_shorthand_payload() {
        let event =
            InboundEvent::parse_line(r#"{"event":"before:spec","payload":{"spec":"a.cy.ts"}}"#).unwrap();
        assert_eq!(event, InboundEvent::BeforeSpec(json!("a.cy.ts")));
    }

    #[test]
    fn test_custom_event_defaults() {
        let (event, supplied) = custom_event(json!({"label": "login done", "spec": "a.cy.ts"})).unwrap();
        assert_eq!(event.kind, TimelineKind::Custom);
        assert!(!supplied);

        let (event, supplied) = custom_event(json!({"type": "test:start", "atMillis": 12.5})).unwrap();
        assert_eq!(event.kind, TimelineKind::TestStart);
        assert_eq!(event.at_millis, 12.5);
        assert!(supplied);

        assert!(custom_event(json!({"type": "nope"})).is_err());
        assert!(custom_event(json!(3)).is_err());
    }
}
