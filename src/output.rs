//! CLI output formatting for every command.
//!
//! Output lists what the engine *found*, not which bytes changed: each
//! placeholder, block and CTA gets a numbered header line, with where it came
//! from as indented context below it.
//!
//! # Output Format
//!
//! ## Adapt
//!
//! ```text
//! Placeholders
//! 001 preheader (text) <- div
//! 002 title (text) <- h1
//! 003 cta_1_text (text) <- a
//! 004 cta_1_url (url) <- a
//!
//! Blocks
//! 001 speakers <- [class*=speakers]
//!
//! CTAs
//! 001 Register now
//!     Link: https://example.com/register
//!
//! Meta
//!     Preheader: yes
//!     Footer: detected
//! ```
//!
//! ## Validate
//!
//! ```text
//! Valid (1 placeholder)
//! 001 body
//!
//! Warnings
//!     Missing recommended placeholder: title
//! ```
//!
//! ## Batch
//!
//! ```text
//! welcome.html -> welcome.template.json (6 placeholders, 1 block)
//! Adapted 3 files, 0 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or
//! `String`) for testability and a `print_*` wrapper. Format functions are
//! pure.
//!
//! The adapt summary and batch lines are progress output and go to stderr,
//! keeping stdout free for the template JSON. The validation report is the
//! result of `validate` and goes to stdout.

use crate::types::{AdaptedTemplate, PlaceholderKind, ValidationReport};

/// Longest CTA label shown before truncation.
const CTA_LABEL_CHARS: usize = 40;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 placeholder`, `2 placeholders`.
fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn kind_label(kind: PlaceholderKind) -> &'static str {
    match kind {
        PlaceholderKind::Text => "text",
        PlaceholderKind::Url => "url",
        PlaceholderKind::Image => "image",
        PlaceholderKind::Block => "block",
        PlaceholderKind::Loop => "loop",
    }
}

/// Truncate to `max` characters, appending `...` if truncated.
fn truncate_label(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

// ============================================================================
// Adapt
// ============================================================================

pub fn format_adapt_output(template: &AdaptedTemplate) -> Vec<String> {
    let mut lines = Vec::new();

    let (blocks, values): (Vec<_>, Vec<_>) = template
        .placeholders
        .iter()
        .partition(|p| p.kind == PlaceholderKind::Block);

    lines.push("Placeholders".to_string());
    if values.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, p) in values.iter().enumerate() {
        lines.push(format!(
            "{} {} ({}) <- {}",
            format_index(i + 1),
            p.name,
            kind_label(p.kind),
            p.selector_hint
        ));
    }

    if !blocks.is_empty() {
        lines.push(String::new());
        lines.push("Blocks".to_string());
        for (i, p) in blocks.iter().enumerate() {
            lines.push(format!("{} {} <- {}", format_index(i + 1), p.name, p.selector_hint));
        }
    }

    if !template.meta.detected_ctas.is_empty() {
        lines.push(String::new());
        lines.push("CTAs".to_string());
        for (i, cta) in template.meta.detected_ctas.iter().enumerate() {
            lines.push(format!(
                "{} {}",
                format_index(i + 1),
                truncate_label(&cta.original_text, CTA_LABEL_CHARS)
            ));
            lines.push(format!("{}Link: {}", indent(1), cta.original_href));
        }
    }

    lines.push(String::new());
    lines.push("Meta".to_string());
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    lines.push(format!("{}Preheader: {}", indent(1), yes_no(template.meta.supports_preheader)));
    lines.push(format!(
        "{}Footer: {}",
        indent(1),
        if template.meta.detected_footer { "detected" } else { "not found" }
    ));
    lines
}

pub fn print_adapt_output(template: &AdaptedTemplate) {
    for line in format_adapt_output(template) {
        eprintln!("{}", line);
    }
}

// ============================================================================
// Validate
// ============================================================================

pub fn format_validation_output(report: &ValidationReport) -> Vec<String> {
    let mut lines = Vec::new();
    let status = if report.valid { "Valid" } else { "Invalid" };
    lines.push(format!("{} ({})", status, plural(report.placeholders.len(), "placeholder")));
    for (i, name) in report.placeholders.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
    }

    for (heading, items) in [("Errors", &report.errors), ("Warnings", &report.warnings)] {
        if items.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(heading.to_string());
        for item in items {
            lines.push(format!("{}{}", indent(1), item));
        }
    }
    lines
}

/// Writes to stdout: the report is the command's result.
pub fn print_validation_output(report: &ValidationReport) {
    for line in format_validation_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// One line per adapted file in `adapt-dir`.
pub fn format_batch_line(source: &str, output: &str, template: &AdaptedTemplate) -> String {
    let blocks = template.meta.has_blocks.len();
    let values = template.placeholders.len() - blocks.min(template.placeholders.len());
    format!(
        "{} -> {} ({}, {})",
        source,
        output,
        plural(values, "placeholder"),
        plural(blocks, "block")
    )
}

pub fn format_batch_failure(source: &str, error: &str) -> String {
    format!("{} -> FAILED: {}", source, error)
}

pub fn format_batch_summary(adapted: usize, failed: usize) -> String {
    format!("Adapted {}, {} failed", plural(adapted, "file"), failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectedCta, Placeholder, TemplateMeta};

    fn sample_template() -> AdaptedTemplate {
        AdaptedTemplate {
            original_html: String::new(),
            html: String::new(),
            placeholders: vec![
                Placeholder::new("preheader", PlaceholderKind::Text, "div").with_element("div"),
                Placeholder::new("title", PlaceholderKind::Text, "h1").with_element("h1"),
                Placeholder::new("cta_1_text", PlaceholderKind::Text, "a"),
                Placeholder::new("cta_1_url", PlaceholderKind::Url, "a"),
                Placeholder::new("speakers", PlaceholderKind::Block, "[class*=speakers]"),
            ],
            meta: TemplateMeta {
                supports_preheader: true,
                detected_ctas: vec![DetectedCta {
                    html_snapshot: String::new(),
                    text_placeholder: "cta_1_text".into(),
                    url_placeholder: "cta_1_url".into(),
                    original_text: "Register now".into(),
                    original_href: "https://example.com/register".into(),
                }],
                detected_footer: true,
                has_blocks: vec!["speakers".into()],
                ..Default::default()
            },
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "block"), "1 block");
        assert_eq!(plural(0, "block"), "0 blocks");
    }

    #[test]
    fn truncate_label_counts_chars() {
        assert_eq!(truncate_label("short", 40), "short");
        assert_eq!(truncate_label("Записаться", 4), "Запи...");
    }

    // =========================================================================
    // Adapt
    // =========================================================================

    #[test]
    fn adapt_output_sections() {
        let lines = format_adapt_output(&sample_template());
        assert_eq!(
            lines,
            vec![
                "Placeholders",
                "001 preheader (text) <- div",
                "002 title (text) <- h1",
                "003 cta_1_text (text) <- a",
                "004 cta_1_url (url) <- a",
                "",
                "Blocks",
                "001 speakers <- [class*=speakers]",
                "",
                "CTAs",
                "001 Register now",
                "    Link: https://example.com/register",
                "",
                "Meta",
                "    Preheader: yes",
                "    Footer: detected",
            ]
        );
    }

    #[test]
    fn adapt_output_without_placeholders() {
        let template = AdaptedTemplate {
            original_html: String::new(),
            html: String::new(),
            placeholders: vec![],
            meta: TemplateMeta::default(),
        };
        let lines = format_adapt_output(&template);
        assert_eq!(lines[1], "    (none)");
        assert!(lines.contains(&"    Preheader: no".to_string()));
        assert!(lines.contains(&"    Footer: not found".to_string()));
        assert!(!lines.contains(&"CTAs".to_string()));
    }

    // =========================================================================
    // Validate
    // =========================================================================

    #[test]
    fn validation_output_lists_warnings() {
        let report = crate::extract::validate("{{body}}");
        let lines = format_validation_output(&report);
        assert_eq!(lines[0], "Valid (1 placeholder)");
        assert_eq!(lines[1], "001 body");
        assert_eq!(lines[3], "Warnings");
        assert!(lines[4].starts_with("    Missing recommended placeholder"));
        assert!(!lines.contains(&"Errors".to_string()));
    }

    #[test]
    fn validation_output_is_report_only() {
        let report = crate::extract::validate("{{preheader}}{{title}}{{cta_1_text}}{{cta_1_url}}");
        let lines = format_validation_output(&report);
        assert_eq!(
            lines,
            ["Valid (4 placeholders)", "001 preheader", "002 title", "003 cta_1_text", "004 cta_1_url"]
        );
    }

    // =========================================================================
    // Batch
    // =========================================================================

    #[test]
    fn batch_line_counts() {
        let line = format_batch_line("a.html", "a.template.json", &sample_template());
        assert_eq!(line, "a.html -> a.template.json (4 placeholders, 1 block)");
    }

    #[test]
    fn batch_summary() {
        assert_eq!(format_batch_summary(3, 0), "Adapted 3 files, 0 failed");
        assert_eq!(format_batch_summary(1, 2), "Adapted 1 file, 2 failed");
        assert_eq!(format_batch_failure("x.html", "boom"), "x.html -> FAILED: boom");
    }
}
