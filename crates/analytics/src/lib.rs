//! CyNova Analytics
//!
//! Cross-run insights computed when a run finishes:
//!
//! - flaky tests over the most recent runs of history
//! - duration outliers inside the current run
//! - duration and pass-rate trends over the whole history
//! - per-browser aggregates
//! - spec dependency lists
//! - screenshot diffs between attempts (feature `screenshot-diff`)
//!
//! History lives in a flat JSON file next to the summary report and grows
//! by one entry per run.

pub mod engine;
pub mod flaky;
pub mod history;
pub mod outliers;
pub mod trends;
pub mod visual;

pub use engine::AnalyticsEngine;
pub use history::{CyNovaHistory, HistoryRunEntry, HistoryTestOutcome, HistoryTotals};
pub use visual::ScreenshotDiffer;
