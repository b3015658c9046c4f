//! Placeholder extraction and template validation.
//!
//! Works on any template string, adapted or hand-written. Control tokens
//! (`{{#block:…}}`, `{{/each}}`, …) are not placeholders; `{{@index}}` is.

use crate::types::ValidationReport;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("token regex"));

/// Placeholders every sendable template should expose.
pub const RECOMMENDED: &[&str] = &["title", "preheader"];

/// Distinct placeholder names in first-occurrence order.
pub fn extract(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TOKEN_RE
        .captures_iter(template)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty() && !name.starts_with('#') && !name.starts_with('/'))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Check a template for the placeholders a campaign send expects.
///
/// Missing recommendations are warnings, not errors; `errors` stays empty and
/// the template is always reported valid.
pub fn validate(template: &str) -> ValidationReport {
    let placeholders = extract(template);
    let missing_required: Vec<String> = RECOMMENDED
        .iter()
        .filter(|name| !placeholders.iter().any(|p| p == *name))
        .map(|name| name.to_string())
        .collect();

    let mut warnings: Vec<String> = missing_required
        .iter()
        .map(|name| format!("Missing recommended placeholder: {name}"))
        .collect();
    if !placeholders.iter().any(|p| p.contains("cta")) {
        warnings.push("No CTA placeholders found".to_string());
    }

    let errors = Vec::new();
    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        placeholders,
        missing_required,
    }
}
