//! CyNova
//!
//! Run reporter for browser end-to-end test suites. A [`Reporter`] is fed
//! the test framework's lifecycle hooks and `cy.task` calls, and when the
//! run ends it:
//!
//! 1. assembles a [`CyNovaRun`] from the raw results plus the logs the
//!    browser reported for each spec
//! 2. computes cross-run analytics against the history file
//! 3. writes `cynova-summary.json` and, optionally, a single-file HTML report
//! 4. broadcasts the finished run to live observers
//!
//! ```no_run
//! use cynova::{CyNovaOptions, Reporter};
//! use serde_json::json;
//!
//! let reporter = Reporter::new(CyNovaOptions::default());
//! reporter.before_run(&json!({"cypressVersion": "13.5.0"}));
//! reporter.before_spec(&json!({"relative": "cypress/e2e/a.cy.ts"}));
//! reporter.task("cynova:console", json!({"message": "hi", "spec": "cypress/e2e/a.cy.ts"}));
//! let run = reporter.after_run(&json!({"totalTests": 0, "runs": []}));
//! assert_eq!(run.tool, "CyNova");
//! ```

pub mod assembler;
pub mod broadcast;
pub mod correlator;
pub mod raw;
pub mod reporter;
pub mod timeline;

pub use assembler::{assemble, RunMeta};
pub use broadcast::Broadcaster;
pub use correlator::{LogCorrelator, SpecExtrasBucket, CONSOLE_TASK, NETWORK_TASK, TIMELINE_TASK};
pub use reporter::{InboundEvent, Outcome, Reporter};
pub use timeline::TimelineRecorder;

pub use cynova_analytics as analytics;
pub use cynova_common as common;
pub use cynova_common::{CyNovaOptions, CyNovaRun, LiveServerOptions};
pub use cynova_report as report;
