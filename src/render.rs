//! Template rendering.
//!
//! The template language is deliberately tiny and non-recursive:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{name}}`, `{{a.b.c}}` | scalar, looked up by dotted path |
//! | `{{#block:name}}…{{/block:name}}` | kept iff `data.blocks.name` is `true` |
//! | `{{#each list}}…{{/each}}` | repeated per item of `data.list` |
//! | `{{list.field}}`, `{{@index}}` | per-item value and 0-based index, inside `each` |
//!
//! Rendering is a fixed sequence of string-to-string stages, each a public
//! function that can be tested on its own:
//!
//! ```text
//! resolve_blocks → expand_loops → substitute_scalars(flatten(data)) → strip_unresolved
//! ```
//!
//! Sections and loops must resolve before scalars: loop bodies reference
//! `{{list.field}}`, which would otherwise be looked up as a scalar. Arrays
//! are left out of [`flatten`] for the same reason.
//!
//! Rendering never fails. Unknown keys, missing loop data, and values of the
//! wrong shape all end up as empty output.

use crate::plain_text::html_to_text;
use crate::types::RenderResult;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::trace;

/// Arbitrary nested JSON data. The `blocks` key maps block names to
/// visibility; top-level arrays of objects drive `each` loops.
pub type RenderData = Value;

static BLOCK_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{#block:([\w.\-]+)\}\}").expect("block regex"));
static EACH_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{#each\s+([\w.\-]+)\s*\}\}").expect("each regex"));
static SCALAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("scalar regex"));
static LEFTOVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").expect("leftover regex"));

const EACH_CLOSE: &str = "{{/each}}";

/// Render a template against data, producing HTML and its plain-text twin.
pub fn render(template: &str, data: &RenderData) -> RenderResult {
    let html = resolve_blocks(template, data);
    trace!(len = html.len(), "blocks resolved");
    let html = expand_loops(&html, data);
    trace!(len = html.len(), "loops expanded");
    let html = substitute_scalars(&html, &flatten(data));
    let html = strip_unresolved(&html);
    let text = html_to_text(&html);
    RenderResult { html, text }
}

// ============================================================================
// Stage 1: block sections
// ============================================================================

fn block_visible(data: &Value, name: &str) -> bool {
    data.get("blocks")
        .and_then(|blocks| blocks.get(name))
        .and_then(Value::as_bool)
        == Some(true)
}

/// Keep or drop every `{{#block:NAME}}…{{/block:NAME}}` section.
///
/// A section ends at the nearest closer with the same name. After a section
/// is replaced by its body, scanning resumes at the start of that body, so
/// sections nested inside it are resolved too. An opener with no closer is
/// skipped and left for [`strip_unresolved`].
pub fn resolve_blocks(template: &str, data: &Value) -> String {
    let mut out = template.to_string();
    let mut cursor = 0;
    loop {
        let (start, body_start, name) = match BLOCK_OPEN_RE.captures_at(&out, cursor) {
            Some(caps) => match caps.get(0) {
                Some(whole) => (whole.start(), whole.end(), caps[1].to_string()),
                None => break,
            },
            None => break,
        };
        let closer = format!("{{{{/block:{name}}}}}");
        let Some(offset) = out[body_start..].find(&closer) else {
            cursor = body_start;
            continue;
        };
        let body_end = body_start + offset;
        let replacement = if block_visible(data, &name) {
            out[body_start..body_end].to_string()
        } else {
            String::new()
        };
        out.replace_range(start..body_end + closer.len(), &replacement);
        cursor = start;
    }
    out
}

// ============================================================================
// Stage 2: each-loops
// ============================================================================

/// Expand every `{{#each NAME}}…{{/each}}` region against `data[NAME]`.
///
/// Missing, non-array, or empty data renders nothing. Loops do not nest:
/// each region ends at the nearest `{{/each}}`, and expanded output is not
/// scanned again.
pub fn expand_loops(template: &str, data: &Value) -> String {
    let mut out = template.to_string();
    let mut cursor = 0;
    loop {
        let (start, body_start, name) = match EACH_OPEN_RE.captures_at(&out, cursor) {
            Some(caps) => match caps.get(0) {
                Some(whole) => (whole.start(), whole.end(), caps[1].to_string()),
                None => break,
            },
            None => break,
        };
        let Some(offset) = out[body_start..].find(EACH_CLOSE) else {
            cursor = body_start;
            continue;
        };
        let body_end = body_start + offset;
        let expanded = expand_items(&name, &out[body_start..body_end], data.get(&name));
        out.replace_range(start..body_end + EACH_CLOSE.len(), &expanded);
        cursor = start + expanded.len();
    }
    out
}

fn expand_items(name: &str, body: &str, items: Option<&Value>) -> String {
    let Some(items) = items.and_then(Value::as_array) else {
        return String::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut iteration = body.to_string();
            if let Value::Object(fields) = item {
                for (key, value) in fields {
                    let token = format!("{{{{{name}.{key}}}}}");
                    iteration = iteration.replace(&token, &stringify(value));
                }
            }
            iteration.replace("{{@index}}", &index.to_string())
        })
        .collect()
}

// ============================================================================
// Stage 3: flatten + scalar substitution
// ============================================================================

/// Flatten nested objects into dot-path keys (`a.b.c`).
///
/// Arrays are skipped entirely; they are only reachable through `each`.
pub fn flatten(data: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into("", data, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let Value::Object(fields) = value else {
        return;
    };
    for (key, value) in fields {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(_) => flatten_into(&path, value, out),
            Value::Array(_) => {}
            scalar => {
                out.insert(path, stringify(scalar));
            }
        }
    }
}

/// Replace `{{key}}` (inner whitespace ignored) for every known key.
/// Unknown tokens are left for [`strip_unresolved`].
pub fn substitute_scalars(template: &str, values: &BTreeMap<String, String>) -> String {
    SCALAR_RE
        .replace_all(template, |caps: &Captures| match values.get(caps[1].trim()) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// String form of a data value as it appears in rendered output.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Integral floats print without a fractional part (`3.0` → `3`).
fn format_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

// ============================================================================
// Stage 4: cleanup
// ============================================================================

/// Remove every remaining `{{…}}` token.
pub fn strip_unresolved(html: &str) -> String {
    LEFTOVER_RE.replace_all(html, "").into_owned()
}
