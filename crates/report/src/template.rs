//! Handlebars rendering for the HTML report
//!
//! The data context is the serialized run plus a few render-only keys.
//! `{{json this}}` embeds the run without those keys.

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderErrorReason, Template,
};
use serde_json::{Map, Value};

use cynova_common::{CyNovaRun, Error, Result};

use crate::html::{script_safe, INLINE_CSS, INLINE_JS};

const TEMPLATE_NAME: &str = "report";

/// Keys added to the context for rendering only
const RENDER_KEYS: [&str; 4] = ["inlineCss", "inlineJs", "passRate", "browserLabel"];

handlebars_helper!(round: |v: f64| format!("{:.0}", v));
handlebars_helper!(fixed2: |v: f64| format!("{:.2}", v));
handlebars_helper!(percent: |v: f64| format!("{:.2}", v * 100.0));
handlebars_helper!(count: |v: Json| match v {
    Value::Array(items) => items.len(),
    Value::Object(map) => map.len(),
    _ => 0,
});

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let mut value = h.param(0).map(|p| p.value().clone()).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        for key in RENDER_KEYS {
            map.remove(key);
        }
    }
    let json = script_safe(&value).map_err(|e| RenderErrorReason::Other(e.to_string()))?;
    out.write(&json)?;
    Ok(())
}

/// Check that `source` parses before committing to it
pub(crate) fn validate(source: &str) -> Result<()> {
    Template::compile(source)
        .map(|_| ())
        .map_err(|e| Error::Render(e.to_string()))
}

pub(crate) fn render(source: &str, run: &CyNovaRun) -> Result<String> {
    let mut registry = Handlebars::new();
    registry.register_helper("json", Box::new(json_helper));
    registry.register_helper("round", Box::new(round));
    registry.register_helper("fixed2", Box::new(fixed2));
    registry.register_helper("percent", Box::new(percent));
    registry.register_helper("count", Box::new(count));
    registry
        .register_template_string(TEMPLATE_NAME, source)
        .map_err(|e| Error::Render(e.to_string()))?;

    registry
        .render(TEMPLATE_NAME, &data(run)?)
        .map_err(|e| Error::Render(e.to_string()))
}

fn data(run: &CyNovaRun) -> Result<Value> {
    let mut data = match serde_json::to_value(run)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.insert("inlineCss".into(), INLINE_CSS.into());
    data.insert("inlineJs".into(), INLINE_JS.into());
    data.insert(
        "passRate".into(),
        format!("{:.2}", run.totals.pass_rate_pct()).into(),
    );
    data.insert("browserLabel".into(), browser_label(run).into());
    Ok(Value::Object(data))
}

fn browser_label(run: &CyNovaRun) -> String {
    match &run.browser {
        Some(b) => {
            let name = b
                .display_name
                .as_deref()
                .or(b.name.as_deref())
                .unwrap_or("unknown");
            match &b.version {
                Some(version) => format!("{} {}", name, version),
                None => name.to_string(),
            }
        }
        None => String::new(),
    }
}
