//! Single-file HTML report
//!
//! Templates are Handlebars sources rendered with the run as data. The
//! run itself is always embedded as `window.__CYNOVA__` so the page can
//! enhance itself client side.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use cynova_common::{CyNovaOptions, CyNovaRun, Result};

#[cfg(feature = "html")]
use crate::template;
#[cfg(feature = "html")]
use tracing::debug;

pub(crate) const INLINE_CSS: &str = include_str!("../static/report.css");
pub(crate) const INLINE_JS: &str = include_str!("../static/enhance.js");

#[cfg(feature = "html")]
const BUILTIN_TEMPLATE: &str = include_str!("../static/report.hbs");

/// How the HTML report is produced
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlRenderer {
    /// Handlebars template source
    #[cfg(feature = "html")]
    Template(String),
    /// Minimal document with the totals line and embedded data
    Fallback,
}

impl HtmlRenderer {
    /// Pick the renderer once for the whole run
    ///
    /// A `template_path` that cannot be read or does not compile degrades
    /// to the fallback document rather than failing the report.
    pub fn resolve(template_path: Option<&Path>, force_fallback: bool) -> Self {
        if force_fallback {
            info!("[CyNova] HTML fallback forced by configuration");
            return HtmlRenderer::Fallback;
        }
        Self::resolve_template(template_path)
    }

    #[cfg(feature = "html")]
    fn resolve_template(template_path: Option<&Path>) -> Self {
        match template_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(source) => match template::validate(&source) {
                    Ok(()) => {
                        debug!("Using HTML template {}", path.display());
                        HtmlRenderer::Template(source)
                    }
                    Err(e) => {
                        warn!(
                            "[CyNova] Template {} is invalid ({}), using fallback HTML",
                            path.display(),
                            e
                        );
                        HtmlRenderer::Fallback
                    }
                },
                Err(e) => {
                    warn!(
                        "[CyNova] Template {} unreadable ({}), using fallback HTML",
                        path.display(),
                        e
                    );
                    HtmlRenderer::Fallback
                }
            },
            None => HtmlRenderer::Template(BUILTIN_TEMPLATE.to_string()),
        }
    }

    #[cfg(not(feature = "html"))]
    fn resolve_template(template_path: Option<&Path>) -> Self {
        if let Some(path) = template_path {
            warn!(
                "[CyNova] Built without HTML templates, ignoring {}",
                path.display()
            );
        } else {
            info!("[CyNova] Built without HTML templates, using fallback HTML");
        }
        HtmlRenderer::Fallback
    }

    pub fn from_options(options: &CyNovaOptions) -> Self {
        Self::resolve(options.template_path.as_deref(), options.force_html_fallback)
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, HtmlRenderer::Fallback)
    }

    pub fn render(&self, run: &CyNovaRun) -> Result<String> {
        match self {
            #[cfg(feature = "html")]
            HtmlRenderer::Template(source) => match template::render(source, run) {
                Ok(html) => Ok(html),
                Err(e) => {
                    warn!("[CyNova] {}, using fallback HTML", e);
                    fallback_document(run)
                }
            },
            HtmlRenderer::Fallback => fallback_document(run),
        }
    }
}

/// Render `run` with `renderer`
pub fn render_html(run: &CyNovaRun, renderer: &HtmlRenderer) -> Result<String> {
    renderer.render(run)
}

/// Render and write the report to `path`, creating parent directories
pub fn write_html(run: &CyNovaRun, renderer: &HtmlRenderer, path: &Path) -> Result<PathBuf> {
    let html = renderer.render(run)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;

    info!("[CyNova] HTML report written: {}", path.display());
    Ok(path.to_path_buf())
}

/// JSON that cannot terminate the surrounding `<script>` element
pub fn script_safe<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn fallback_document(run: &CyNovaRun) -> Result<String> {
    let json = script_safe(run)?;
    let t = &run.totals;
    Ok(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="UTF-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>CyNova Report (fallback)</title>
<style>{css}</style>
</head>
<body>
<header class="cn-header"><h1>CyNova</h1><span class="cn-sub">{generated}</span></header>
<main class="cn-container">
  <section class="card">
    <h2>Summary</h2>
    <p>Tests: {tests}, Passed: {passed}, Failed: {failed}, Pending: {pending}, Skipped: {skipped}</p>
  </section>
  <section class="card">
    <h2>Live events</h2>
    <ol id="cn-events" class="cn-events"></ol>
  </section>
</main>
<script>window.__CYNOVA__ = {json};</script>
<script>{js}</script>
</body>
</html>
"#,
        css = INLINE_CSS,
        generated = escape_html(&run.generated_at.to_rfc3339()),
        tests = t.tests,
        passed = t.passed,
        failed = t.failed,
        pending = t.pending,
        skipped = t.skipped,
        json = json,
        js = INLINE_JS,
    ))
}
