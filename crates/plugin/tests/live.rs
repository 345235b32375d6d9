//! Live observers see the run unfold and receive the final summary
#![cfg(feature = "live")]

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_tungstenite::connect_async;

use cynova::{CyNovaOptions, LiveServerOptions, Reporter};

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("frame before timeout")
        .expect("stream open")
        .expect("valid frame");
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn observer_receives_lifecycle_tasks_and_summary() {
    let tmp = TempDir::new().unwrap();
    let reporter = Reporter::new(CyNovaOptions {
        output_dir: tmp.path().to_path_buf(),
        generate_html: false,
        live_server: LiveServerOptions {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        },
        ..Default::default()
    });

    let addr = reporter.live_addr().expect("live server running");
    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    for _ in 0..100 {
        if reporter.live_observers() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    reporter.before_run(&json!({}));
    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "timeline");
    assert_eq!(first["event"]["type"], "run:start");
    let second = next_json(&mut ws).await;
    assert_eq!(second["type"], "lifecycle");
    assert_eq!(second["phase"], "before:run");

    reporter.task("cynova:console", json!({"message": "hello", "spec": "a.cy.ts"}));
    let task = next_json(&mut ws).await;
    assert_eq!(task["type"], "task");
    assert_eq!(task["task"], "cynova:console");
    assert_eq!(task["entry"]["message"], "hello");

    reporter.after_run(&json!({"totalTests": 0, "runs": []}));
    let mut summary = None;
    for _ in 0..5 {
        let msg = next_json(&mut ws).await;
        if msg["type"] == "summary" {
            summary = Some(msg);
            break;
        }
    }
    let summary = summary.expect("summary message");
    assert_eq!(summary["run"]["tool"], "CyNova");

    reporter.shutdown();
    assert!(reporter.live_addr().is_none());
}

#[test]
fn enabled_live_without_runtime_still_reports() {
    let tmp = TempDir::new().unwrap();
    let reporter = Reporter::new(CyNovaOptions {
        output_dir: tmp.path().to_path_buf(),
        generate_html: false,
        live_server: LiveServerOptions {
            enabled: true,
            ..Default::default()
        },
        ..Default::default()
    });

    assert!(reporter.live_addr().is_none());
    let run = reporter.after_run(&json!({"totalTests": 2, "runs": []}));
    assert_eq!(run.totals.tests, 2);
}
