//! CyNova Report
//!
//! Writes the summary JSON and renders the single-file HTML report.
//! The HTML renderer is resolved once per reporter: a Handlebars
//! template (feature `html`) or a minimal fallback document that still
//! embeds the full run as `window.__CYNOVA__`.

pub mod html;
pub mod json;
#[cfg(feature = "html")]
mod template;

pub use html::{render_html, write_html, HtmlRenderer};
pub use json::{read_summary, write_json};
