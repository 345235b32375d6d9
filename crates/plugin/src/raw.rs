//! Lenient readers over the framework's untyped payloads
//!
//! Hook arguments arrive as arbitrary JSON. Every accessor here treats a
//! missing, null or wrongly typed field as absent, so malformed input
//! degrades to defaults instead of failing the run.

use serde_json::{Map, Value};

use cynova_common::{
    AttemptError, BrowserInfo, MediaKind, MediaRef, OsInfo, RunTotals, TestAttempt, TestResultNode, TestState,
    UNKNOWN_SPEC,
};

/// Separator between suite path segments in display titles and derived ids
pub const TITLE_SEPARATOR: &str = " > ";

fn field<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key).filter(|x| !x.is_null())
}

pub fn str_at<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    field(v, key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn f64_at(v: &Value, key: &str) -> Option<f64> {
    field(v, key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

pub fn u64_at(v: &Value, key: &str) -> Option<u64> {
    let value = field(v, key)?;
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    })
}

pub fn u32_at(v: &Value, key: &str) -> Option<u32> {
    u64_at(v, key).and_then(|n| u32::try_from(n).ok())
}

pub fn bool_at(v: &Value, key: &str) -> Option<bool> {
    field(v, key).and_then(Value::as_bool)
}

pub fn array_at<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    field(v, key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn object_at<'a>(v: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    field(v, key).and_then(Value::as_object)
}

/// Identity of a spec: relative path, else absolute, else name
///
/// Accepts either a spec object or a bare path string.
pub fn spec_identity(spec: &Value) -> String {
    if let Some(path) = spec.as_str().filter(|s| !s.is_empty()) {
        return path.to_string();
    }
    str_at(spec, "relative")
        .or_else(|| str_at(spec, "absolute"))
        .or_else(|| str_at(spec, "name"))
        .unwrap_or(UNKNOWN_SPEC)
        .to_string()
}

pub fn spec_absolute(spec: &Value) -> Option<String> {
    str_at(spec, "absolute").map(str::to_string)
}

/// Run-level counters, copied as reported
pub fn totals(results: &Value) -> RunTotals {
    RunTotals {
        tests: u64_at(results, "totalTests").unwrap_or(0),
        passed: u64_at(results, "totalPassed").unwrap_or(0),
        failed: u64_at(results, "totalFailed").unwrap_or(0),
        pending: u64_at(results, "totalPending").unwrap_or(0),
        skipped: u64_at(results, "totalSkipped").unwrap_or(0),
        duration_ms: f64_at(results, "totalDuration").unwrap_or(0.0),
    }
}

/// `os` object, else `osName`/`osVersion`
pub fn os(results: &Value) -> Option<OsInfo> {
    if let Some(os) = field(results, "os").filter(|v| v.is_object()) {
        return Some(OsInfo {
            platform: str_at(os, "platform").map(str::to_string),
            arch: str_at(os, "arch").map(str::to_string),
            release: str_at(os, "release").map(str::to_string),
        });
    }

    let platform = str_at(results, "osName");
    let release = str_at(results, "osVersion");
    if platform.is_none() && release.is_none() {
        return None;
    }
    Some(OsInfo {
        platform: platform.map(str::to_string),
        arch: None,
        release: release.map(str::to_string),
    })
}

/// Browser description as passed to `before:browser:launch`
pub fn browser(v: &Value) -> Option<BrowserInfo> {
    if !v.is_object() {
        return None;
    }
    let major_version = u32_at(v, "majorVersion")
        .or_else(|| str_at(v, "majorVersion").and_then(|s| s.parse().ok()));

    Some(BrowserInfo {
        name: str_at(v, "name").map(str::to_string),
        family: str_at(v, "family").map(str::to_string),
        version: str_at(v, "version").map(str::to_string),
        major_version,
        channel: str_at(v, "channel").map(str::to_string),
        is_headless: bool_at(v, "isHeadless"),
        is_headed: bool_at(v, "isHeaded"),
        display_name: str_at(v, "displayName").map(str::to_string),
    })
}

/// `browserName`/`browserVersion` from the run results
pub fn browser_from_results(results: &Value) -> Option<BrowserInfo> {
    let name = str_at(results, "browserName");
    let version = str_at(results, "browserVersion");
    if name.is_none() && version.is_none() {
        return None;
    }
    Some(BrowserInfo {
        name: name.map(str::to_string),
        version: version.map(str::to_string),
        ..Default::default()
    })
}

/// A screenshot or video given either as a path string or an object with `path`
pub fn media(v: &Value, kind: MediaKind) -> Option<MediaRef> {
    let path = match v.as_str().filter(|s| !s.is_empty()) {
        Some(path) => path,
        None => str_at(v, "path")?,
    };
    let mut media = MediaRef::screenshot(path);
    media.kind = kind;
    media.width = u32_at(v, "width");
    media.height = u32_at(v, "height");
    media.size_bytes = u64_at(v, "size").or_else(|| u64_at(v, "sizeBytes"));
    Some(media)
}

pub fn screenshots(v: &Value, test_id: Option<&str>) -> Vec<MediaRef> {
    array_at(v, "screenshots")
        .iter()
        .filter_map(|s| media(s, MediaKind::Screenshot))
        .map(|mut s| {
            if s.test_id.is_none() {
                s.test_id = test_id.map(str::to_string);
            }
            s
        })
        .collect()
}

/// Suite path plus test title; a plain string title is one segment
pub fn title_segments(test: &Value) -> Vec<String> {
    match field(test, "title") {
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(title)) => vec![title.clone()],
        _ => Vec::new(),
    }
}

/// `testId`, else `id`, else the joined title, else the position in the spec
pub fn test_id(test: &Value, segments: &[String], index: usize) -> String {
    if let Some(id) = str_at(test, "testId").or_else(|| str_at(test, "id")) {
        return id.to_string();
    }
    let joined = segments.join(TITLE_SEPARATOR);
    if joined.is_empty() {
        format!("#{}", index)
    } else {
        joined
    }
}

fn duration(v: &Value) -> Option<f64> {
    f64_at(v, "duration").or_else(|| f64_at(v, "wallClockDuration"))
}

fn started_at(v: &Value) -> Option<String> {
    str_at(v, "startedAt")
        .or_else(|| str_at(v, "wallClockStartedAt"))
        .map(str::to_string)
}

fn attempt_error(v: &Value) -> Option<AttemptError> {
    match field(v, "error")? {
        Value::String(message) => Some(AttemptError {
            message: Some(message.clone()),
            ..Default::default()
        }),
        error @ Value::Object(_) => Some(AttemptError {
            name: str_at(error, "name").map(str::to_string),
            message: str_at(error, "message").map(str::to_string),
            stack: str_at(error, "stack").map(str::to_string),
        }),
        _ => None,
    }
}

pub fn attempt(v: &Value, index: usize, test_id: &str, video: Option<&MediaRef>) -> TestAttempt {
    TestAttempt {
        attempt: u32_at(v, "attempt").unwrap_or(index as u32),
        state: str_at(v, "state").map(TestState::from_raw),
        error: attempt_error(v),
        started_at: started_at(v),
        duration_ms: duration(v),
        screenshots: screenshots(v, Some(test_id)),
        videos: video.cloned().into_iter().collect(),
    }
}

/// One test and its attempts; `video` is the spec's recording, shared by every attempt
pub fn test(v: &Value, index: usize, video: Option<&MediaRef>) -> TestResultNode {
    let title = title_segments(v);
    let id = test_id(v, &title, index);
    let attempts: Vec<TestAttempt> = array_at(v, "attempts")
        .iter()
        .enumerate()
        .map(|(i, a)| attempt(a, i, &id, video))
        .collect();

    let state = str_at(v, "state")
        .map(TestState::from_raw)
        .unwrap_or_default();
    let wall_clock_started_at =
        started_at(v).or_else(|| attempts.first().and_then(|a| a.started_at.clone()));
    let wall_clock_duration_ms =
        duration(v).or_else(|| attempts.first().and_then(|a| a.duration_ms));

    TestResultNode {
        display_title: title.join(TITLE_SEPARATOR),
        id,
        title,
        state,
        attempts,
        wall_clock_started_at,
        wall_clock_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!({"relative": "cypress/e2e/a.cy.ts", "absolute": "/p/cypress/e2e/a.cy.ts"}), "cypress/e2e/a.cy.ts")]
    #[test_case(json!({"absolute": "/p/cypress/e2e/a.cy.ts", "name": "a.cy.ts"}), "/p/cypress/e2e/a.cy.ts")]
    #[test_case(json!({"relative": 7, "name": "a.cy.ts"}), "a.cy.ts")]
    #[test_case(json!("cypress/e2e/b.cy.ts"), "cypress/e2e/b.cy.ts")]
    #[test_case(json!({}), "unknown")]
    #[test_case(json!(null), "unknown")]
    fn test_spec_identity(spec: Value, expected: &str) {
        assert_eq!(spec_identity(&spec), expected);
    }

    #[test_case(json!({"testId": "t1", "id": "r2", "title": ["s", "t"]}), "t1")]
    #[test_case(json!({"id": "r2", "title": ["s", "t"]}), "r2")]
    #[test_case(json!({"title": ["suite", "does A"]}), "suite > does A")]
    #[test_case(json!({"title": "lonely"}), "lonely")]
    #[test_case(json!({"testId": 12}), "#3")]
    fn test_test_id(test: Value, expected: &str) {
        assert_eq!(test_id(&test, &title_segments(&test), 3), expected);
    }

    #[test]
    fn test_totals_ignore_wrong_types() {
        let t = totals(&json!({
            "totalTests": 3,
            "totalPassed": "2",
            "totalFailed": 1.0,
            "totalDuration": 1234.5
        }));
        assert_eq!(t.tests, 3);
        assert_eq!(t.passed, 0);
        assert_eq!(t.failed, 1);
        assert_eq!(t.duration_ms, 1234.5);
    }

    #[test]
    fn test_attempt_error_shapes() {
        let a = attempt(&json!({"error": "boom"}), 0, "t1", None);
        assert_eq!(a.error.unwrap().message.as_deref(), Some("boom"));

        let a = attempt(
            &json!({"error": {"name": "AssertionError", "message": "expected"}}),
            0,
            "t1",
            None,
        );
        let error = a.error.unwrap();
        assert_eq!(error.name.as_deref(), Some("AssertionError"));
        assert!(error.stack.is_none());

        let a = attempt(&json!({"error": null, "state": "passed"}), 2, "t1", None);
        assert!(a.error.is_none());
        assert_eq!(a.attempt, 2);
        assert_eq!(a.state, Some(TestState::Passed));
    }

    #[test]
    fn test_test_falls_back_to_first_attempt() {
        let video = MediaRef::video("cypress/videos/a.mp4");
        let node = test(
            &json!({
                "title": ["suite", "does A"],
                "state": "failed",
                "attempts": [
                    {"duration": 120, "startedAt": "2024-01-01T00:00:00Z",
                     "screenshots": [{"path": "shots/a.png", "width": 800, "height": 600}]},
                    {"wallClockDuration": 90, "state": "failed"}
                ]
            }),
            0,
            Some(&video),
        );

        assert_eq!(node.id, "suite > does A");
        assert_eq!(node.display_title, "suite > does A");
        assert_eq!(node.state, TestState::Failed);
        assert_eq!(node.wall_clock_duration_ms, Some(120.0));
        assert_eq!(node.wall_clock_started_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(node.attempts[1].duration_ms, Some(90.0));
        assert_eq!(node.attempts[1].attempt, 1);

        let shot = &node.attempts[0].screenshots[0];
        assert_eq!(shot.width, Some(800));
        assert_eq!(shot.test_id.as_deref(), Some("suite > does A"));
        assert!(node.attempts.iter().all(|a| a.videos == vec![video.clone()]));
    }

    #[test]
    fn test_test_level_duration_wins() {
        let node = test(
            &json!({"testId": "t9", "duration": 500, "attempts": [{"duration": 20}]}),
            0,
            None,
        );
        assert_eq!(node.wall_clock_duration_ms, Some(500.0));
        assert_eq!(node.state, TestState::Unknown);
        assert!(node.attempts[0].videos.is_empty());
    }

    #[test]
    fn test_os_shapes() {
        let os1 = os(&json!({"os": {"platform": "linux", "arch": "x64"}})).unwrap();
        assert_eq!(os1.platform.as_deref(), Some("linux"));

        let os2 = os(&json!({"osName": "darwin", "osVersion": "23.1"})).unwrap();
        assert_eq!(os2.release.as_deref(), Some("23.1"));

        assert!(os(&json!({})).is_none());
    }

    #[test]
    fn test_browser_major_version_as_string() {
        let b = browser(&json!({"name": "chrome", "majorVersion": "120", "isHeadless": true})).unwrap();
        assert_eq!(b.major_version, Some(120));
        assert_eq!(b.is_headless, Some(true));
        assert!(browser(&json!("chrome")).is_none());
    }
}
