//! Re-render the HTML report from a written summary

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use cynova::report::{read_summary, write_html, HtmlRenderer};

use crate::output::print_success;

const DEFAULT_HTML_NAME: &str = "cynova-report.html";

#[derive(Args)]
pub struct RenderArgs {
    /// Summary JSON written by a previous run
    pub summary: PathBuf,

    /// Where to write the HTML, defaults to next to the summary
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Replacement template
    #[arg(long, conflicts_with = "fallback")]
    pub template: Option<PathBuf>,

    /// Emit the minimal fallback document
    #[arg(long)]
    pub fallback: bool,
}

pub fn execute(args: RenderArgs) -> Result<PathBuf> {
    let run = read_summary(&args.summary)
        .with_context(|| format!("reading summary {}", args.summary.display()))?;

    let out = args.out.unwrap_or_else(|| {
        args.summary
            .parent()
            .map(|dir| dir.join(DEFAULT_HTML_NAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HTML_NAME))
    });
    let renderer = HtmlRenderer::resolve(args.template.as_deref(), args.fallback);
    let path = write_html(&run, &renderer, &out)
        .with_context(|| format!("writing {}", out.display()))?;

    print_success(&format!("HTML report written: {}", path.display()));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynova::report::write_json;
    use cynova_common::{CyNovaRun, RunTotals};

    fn summary(dir: &std::path::Path) -> PathBuf {
        let run = CyNovaRun::new(RunTotals {
            tests: 3,
            passed: 2,
            failed: 1,
            ..Default::default()
        });
        write_json(&run, dir, "summary.json").unwrap()
    }

    #[test]
    fn test_fallback_next_to_summary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let summary = summary(tmp.path());

        let path = execute(RenderArgs {
            summary,
            out: None,
            template: None,
            fallback: true,
        })
        .unwrap();

        assert_eq!(path, tmp.path().join(DEFAULT_HTML_NAME));
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("Tests: 3, Passed: 2, Failed: 1, Pending: 0, Skipped: 0"));
    }

    #[test]
    fn test_custom_template() {
        let tmp = tempfile::TempDir::new().unwrap();
        let summary = summary(tmp.path());
        let template = tmp.path().join("t.html");
        std::fs::write(&template, "<p>{{totals.failed}} failed</p>").unwrap();

        let out = tmp.path().join("custom").join("r.html");
        execute(RenderArgs {
            summary,
            out: Some(out.clone()),
            template: Some(template),
            fallback: false,
        })
        .unwrap();

        let html = std::fs::read_to_string(out).unwrap();
        assert_eq!(html, "<p>1 failed</p>");
    }

    #[test]
    fn test_missing_summary() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = execute(RenderArgs {
            summary: tmp.path().join("nope.json"),
            out: None,
            template: None,
            fallback: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
