//! Element detection over unlabeled email markup.
//!
//! Email layouts carry no semantic labels: the preheader is "a div somebody
//! hid", the CTA is "a link that looks like a button". Each detection target
//! is therefore an ordered list of independent predicates evaluated
//! short-circuit. Adding a heuristic means appending a function to a list;
//! none of the existing ones change.
//!
//! | Target | Strategy |
//! |--------|----------|
//! | Preheader | first of the first 5 body children with 10 < text ≤ 200 chars and any hiding signal |
//! | Title | first non-empty match of the first candidate predicate that hits |
//! | CTAs | every qualifying anchor, deduplicated on (text, href) |
//! | Footer | structural candidates with a keyword, else any 50-500 char element with ≥2 keywords |
//! | Blocks | per name, first element of the first selector pattern that hits |
//!
//! The detector never mutates the document. Absence is a normal outcome and
//! is reported as `None`, `false`, or an empty list.

use crate::dom::{self, Document};
use crate::types::DetectedCta;
use markup5ever_rcdom::Handle;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// How many leading body children may hold the preheader.
const PREHEADER_WINDOW: usize = 5;
const PREHEADER_MIN_CHARS: usize = 10;
const PREHEADER_MAX_CHARS: usize = 200;
const CTA_MAX_CHARS: usize = 100;
/// How far up a CTA anchor may sit below its button-styled table cell.
const CTA_CELL_DEPTH: usize = 3;
const FOOTER_FALLBACK_CHARS: std::ops::RangeInclusive<usize> = 50..=500;

const FOOTER_KEYWORDS: &[&str] = &[
    "unsubscribe",
    "manage preferences",
    "privacy policy",
    "all rights reserved",
    "отписаться",
    "отписка",
    "управление подпиской",
    "политика конфиденциальности",
    "все права защищены",
];

static BUTTON_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)btn|button|cta|action").expect("button class regex"));

// ============================================================================
// Inline style inspection
// ============================================================================

/// An element's `style` attribute, both as raw lower-cased text and as
/// parsed `property: value` declarations.
struct InlineStyle {
    raw: String,
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    fn of(node: &Handle) -> Self {
        let raw = dom::attr(node, "style").unwrap_or_default().to_lowercase();
        let declarations = raw
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(prop, value)| {
                let value = value.trim().trim_end_matches("!important").trim();
                (prop.trim().to_string(), value.to_string())
            })
            .collect();
        Self { raw, declarations }
    }

    /// Raw substring check, with and without a space after the colon.
    fn raw_has(&self, property: &str, value: &str) -> bool {
        self.raw.contains(&format!("{property}:{value}"))
            || self.raw.contains(&format!("{property}: {value}"))
    }

    fn value(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }
}

/// Numeric part of a CSS length or number, e.g. `0px` → 0.0.
fn leading_number(value: &str) -> Option<f64> {
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

const HIDING_SIGNALS: &[fn(&InlineStyle) -> bool] = &[
    |s| s.raw_has("display", "none"),
    |s| s.raw_has("max-height", "0"),
    |s| s.raw_has("opacity", "0"),
    |s| s.raw_has("font-size", "0"),
    |s| s.raw_has("font-size", "1px"),
    |s| s.value("display") == Some("none"),
    |s| s.value("max-height").and_then(leading_number) == Some(0.0),
    |s| s.value("opacity").and_then(leading_number) == Some(0.0),
];

fn is_visually_hidden(node: &Handle) -> bool {
    let style = InlineStyle::of(node);
    HIDING_SIGNALS.iter().any(|signal| signal(&style))
}

// ============================================================================
// Candidate predicates
// ============================================================================

fn class_contains(node: &Handle, needle: &str) -> bool {
    dom::attr(node, "class").is_some_and(|c| c.contains(needle))
}

fn is_heading(node: &Handle) -> bool {
    dom::is_tag(node, "h1") || dom::is_tag(node, "h2")
}

const TITLE_CANDIDATES: &[fn(&Handle) -> bool] = &[
    |n| dom::is_tag(n, "h1"),
    |n| ["title", "heading", "headline"].iter().any(|k| class_contains(n, k)),
    |n| {
        is_heading(n)
            && dom::has_ancestor(n, |a| dom::is_tag(a, "td") || dom::is_tag(a, "th"))
    },
    |n| is_heading(n) && dom::has_ancestor(n, |a| dom::is_tag(a, "div")),
];

fn has_button_style(style: &str) -> bool {
    style.contains("background") || style.contains("border-radius")
}

const CTA_SIGNALS: &[fn(&Handle) -> bool] = &[
    |n| {
        let style = InlineStyle::of(n).raw;
        has_button_style(&style) || style.contains("padding")
    },
    |n| dom::attr(n, "class").is_some_and(|c| BUTTON_CLASS_RE.is_match(&c)),
    |n| dom::attr(n, "role").as_deref() == Some("button"),
    |n| {
        dom::ancestors(n, CTA_CELL_DEPTH).iter().any(|a| {
            (dom::is_tag(a, "td") || dom::is_tag(a, "th"))
                && has_button_style(&InlineStyle::of(a).raw)
        })
    },
];

const FOOTER_CANDIDATES: &[fn(&Handle) -> bool] = &[
    |n| dom::is_tag(n, "footer"),
    |n| dom::attr(n, "role").as_deref() == Some("contentinfo"),
    |n| dom::is_tag(n, "table") && class_contains(n, "footer"),
    |n| dom::is_tag(n, "div") && class_contains(n, "footer"),
];

fn footer_keyword_hits(node: &Handle) -> usize {
    let text = dom::text_content(node).to_lowercase();
    FOOTER_KEYWORDS.iter().filter(|k| text.contains(*k)).count()
}

/// Selector patterns tried, in order, when locating a named block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPattern {
    ClassContains,
    IdContains,
    DataBlock,
    Class,
    Id,
}

impl BlockPattern {
    pub const ORDER: [BlockPattern; 5] = [
        BlockPattern::ClassContains,
        BlockPattern::IdContains,
        BlockPattern::DataBlock,
        BlockPattern::Class,
        BlockPattern::Id,
    ];

    fn matches(self, node: &Handle, name: &str) -> bool {
        match self {
            BlockPattern::ClassContains => class_contains(node, name),
            BlockPattern::IdContains => dom::attr(node, "id").is_some_and(|id| id.contains(name)),
            BlockPattern::DataBlock => dom::attr(node, "data-block").as_deref() == Some(name),
            BlockPattern::Class => {
                dom::attr(node, "class").is_some_and(|c| c.split_whitespace().any(|t| t == name))
            }
            BlockPattern::Id => dom::attr(node, "id").as_deref() == Some(name),
        }
    }

    /// CSS spelling of the pattern for `name`, used as a selector hint.
    pub fn selector(self, name: &str) -> String {
        match self {
            BlockPattern::ClassContains => format!("[class*={name}]"),
            BlockPattern::IdContains => format!("[id*={name}]"),
            BlockPattern::DataBlock => format!("[data-block={name}]"),
            BlockPattern::Class => format!(".{name}"),
            BlockPattern::Id => format!("#{name}"),
        }
    }
}

/// A named block located in the document.
#[derive(Debug, Clone)]
pub struct DetectedBlock {
    pub name: String,
    pub element: Handle,
    pub pattern: BlockPattern,
}

// ============================================================================
// Detector
// ============================================================================

/// Read-only heuristics over a parsed document.
pub struct Detector<'a> {
    doc: &'a Document,
}

impl<'a> Detector<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    pub fn detect_preheader(&self) -> Option<Handle> {
        let body = self.doc.body()?;
        dom::element_children(&body)
            .into_iter()
            .take(PREHEADER_WINDOW)
            .find(|child| {
                let len = dom::text_content(child).trim().chars().count();
                len > PREHEADER_MIN_CHARS && len <= PREHEADER_MAX_CHARS && is_visually_hidden(child)
            })
    }

    pub fn detect_title(&self) -> Option<Handle> {
        let elements = self.doc.elements();
        TITLE_CANDIDATES.iter().find_map(|candidate| {
            elements
                .iter()
                .find(|n| candidate(n) && !dom::text_content(n).trim().is_empty())
                .cloned()
        })
    }

    /// Button-like anchors in document order, deduplicated on trimmed text
    /// plus `href`, named `cta_{n}_text` / `cta_{n}_url` from 1. Anchors whose
    /// text already carries a placeholder are left to the stage that put it
    /// there.
    pub fn detect_ctas(&self) -> Vec<DetectedCta> {
        let mut seen = HashSet::new();
        let mut ctas = Vec::new();
        for anchor in self.doc.elements().iter().filter(|n| dom::is_tag(n, "a")) {
            let Some((text, href)) = link_parts(anchor) else {
                continue;
            };
            // text already substituted by an earlier stage (title, preheader)
            if text.contains("{{") {
                continue;
            }
            if !CTA_SIGNALS.iter().any(|signal| signal(anchor)) {
                continue;
            }
            if !seen.insert((text.clone(), href.clone())) {
                continue;
            }
            let n = ctas.len() + 1;
            ctas.push(DetectedCta {
                html_snapshot: dom::outer_html(anchor),
                text_placeholder: format!("cta_{n}_text"),
                url_placeholder: format!("cta_{n}_url"),
                original_text: text,
                original_href: href,
            });
        }
        ctas
    }

    pub fn detect_footer(&self) -> bool {
        let elements = self.doc.elements();
        let structural = elements
            .iter()
            .filter(|n| FOOTER_CANDIDATES.iter().any(|c| c(n)))
            .any(|n| footer_keyword_hits(n) > 0);
        if structural {
            return true;
        }
        elements.iter().any(|n| {
            let len = dom::text_content(n).trim().chars().count();
            FOOTER_FALLBACK_CHARS.contains(&len) && footer_keyword_hits(n) >= 2
        })
    }

    /// Locate each named block. Names with no match are left out.
    pub fn detect_blocks(&self, names: &[String]) -> Vec<DetectedBlock> {
        let elements = self.doc.elements();
        names
            .iter()
            .filter_map(|name| {
                BlockPattern::ORDER.iter().find_map(|&pattern| {
                    elements
                        .iter()
                        .find(|n| pattern.matches(n, name))
                        .map(|element| DetectedBlock {
                            name: name.clone(),
                            element: element.clone(),
                            pattern,
                        })
                })
            })
            .collect()
    }
}

/// Trimmed text and raw `href` of an anchor that could be a CTA at all:
/// it links somewhere other than an in-page fragment or a mail address, and
/// carries 1-100 characters of text.
pub fn link_parts(anchor: &Handle) -> Option<(String, String)> {
    let href = dom::attr(anchor, "href").filter(|h| !h.is_empty())?;
    if href.starts_with('#') || href.starts_with("mailto:") {
        return None;
    }
    let text = dom::text_content(anchor).trim().to_string();
    let len = text.chars().count();
    if len == 0 || len > CTA_MAX_CHARS {
        return None;
    }
    Some((text, href))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `f` against a freshly parsed document. The document is dropped on
    /// return, which empties every node, so `f` must not hand back `Handle`s.
    fn detect<T>(html: &str, f: impl FnOnce(&Detector) -> T) -> T {
        let doc = Document::parse(html);
        f(&Detector::new(&doc))
    }

    // =========================================================================
    // Preheader
    // =========================================================================

    #[test]
    fn preheader_found_with_display_none() {
        let found = detect(
            r#"<div style="display:none;max-height:0;">Hidden preview text here</div><h1>Hi</h1>"#,
            |d| d.detect_preheader().map(|n| dom::text_content(&n)),
        );
        assert_eq!(found.as_deref(), Some("Hidden preview text here"));
    }

    #[test]
    fn preheader_accepts_spaced_and_computed_forms() {
        for style in [
            "display: none",
            "DISPLAY:NONE",
            "opacity: 0",
            "font-size:1px",
            "max-height: 0px",
            "max-height :  0em",
            "opacity : 0.0",
        ] {
            let html = format!(r#"<div style="{style}">A preview line of text</div>"#);
            assert!(
                detect(&html, |d| d.detect_preheader().is_some()),
                "style {style:?} should count as hidden"
            );
        }
    }

    #[test]
    fn preheader_requires_hidden_style() {
        let html = r#"<div>Visible preview text here</div><p>Body</p>"#;
        assert!(detect(html, |d| d.detect_preheader().is_none()));
    }

    #[test]
    fn preheader_length_bounds() {
        let short = r#"<div style="display:none">ten chars!</div>"#;
        assert!(detect(short, |d| d.detect_preheader().is_none()));
        let eleven = r#"<div style="display:none">eleven char</div>"#;
        assert!(detect(eleven, |d| d.detect_preheader().is_some()));
        let long = format!(r#"<div style="display:none">{}</div>"#, "x".repeat(201));
        assert!(detect(&long, |d| d.detect_preheader().is_none()));
        let max = format!(r#"<div style="display:none">{}</div>"#, "x".repeat(200));
        assert!(detect(&max, |d| d.detect_preheader().is_some()));
    }

    #[test]
    fn preheader_only_in_first_five_children() {
        let filler = "<p>a</p>".repeat(5);
        let html = format!(r#"{filler}<div style="display:none">Hidden preview text here</div>"#);
        assert!(detect(&html, |d| d.detect_preheader().is_none()));
        let filler = "<p>a</p>".repeat(4);
        let html = format!(r#"{filler}<div style="display:none">Hidden preview text here</div>"#);
        assert!(detect(&html, |d| d.detect_preheader().is_some()));
    }

    #[test]
    fn preheader_absent_in_empty_document() {
        assert!(detect("", |d| d.detect_preheader().is_none()));
    }

    // =========================================================================
    // Title
    // =========================================================================

    #[test]
    fn title_prefers_h1() {
        let html = r#"<p class="title">Classy</p><h1>Real title</h1>"#;
        let title = detect(html, |d| d.detect_title().map(|n| dom::text_content(&n)));
        assert_eq!(title.as_deref(), Some("Real title"));
    }

    #[test]
    fn title_skips_empty_h1() {
        let html = r#"<h1>  </h1><h1>Second</h1>"#;
        let title = detect(html, |d| d.detect_title().map(|n| dom::text_content(&n)));
        assert_eq!(title.as_deref(), Some("Second"));
    }

    #[test]
    fn title_falls_back_to_class() {
        let html = r#"<h2>Plain</h2><span class="email-headline">Big news</span>"#;
        let title = detect(html, |d| d.detect_title().map(|n| dom::text_content(&n)));
        assert_eq!(title.as_deref(), Some("Big news"));
    }

    #[test]
    fn title_from_heading_in_table_cell() {
        let html = r#"<div><h2>In div</h2></div><table><tr><td><h2>In cell</h2></td></tr></table>"#;
        let title = detect(html, |d| d.detect_title().map(|n| dom::text_content(&n)));
        assert_eq!(title.as_deref(), Some("In cell"));
    }

    #[test]
    fn title_from_heading_in_div() {
        let html = r#"<div><h2>In div</h2></div>"#;
        let title = detect(html, |d| d.detect_title().and_then(|n| dom::tag_name(&n).map(str::to_string)));
        assert_eq!(title.as_deref(), Some("h2"));
    }

    #[test]
    fn title_absent_without_candidates() {
        assert!(detect("<p>Just text</p>", |d| d.detect_title().is_none()));
    }

    // =========================================================================
    // CTAs
    // =========================================================================

    #[test]
    fn cta_by_inline_style() {
        let ctas = detect(
            r#"<a href="https://x.com/go" style="background:red;">Click</a>"#,
            |d| d.detect_ctas(),
        );
        assert_eq!(ctas.len(), 1);
        assert_eq!(ctas[0].original_text, "Click");
        assert_eq!(ctas[0].original_href, "https://x.com/go");
        assert_eq!(ctas[0].text_placeholder, "cta_1_text");
        assert_eq!(ctas[0].url_placeholder, "cta_1_url");
        assert!(ctas[0].html_snapshot.starts_with("<a "));
    }

    #[test]
    fn cta_by_class_role_and_cell() {
        let html = r#"
            <a href="/a" class="Primary-BTN">A</a>
            <a href="/b" role="button">B</a>
            <table><tr><td style="border-radius:4px"><span><a href="/c">C</a></span></td></tr></table>
            <a href="/d">Plain link</a>
        "#;
        let texts: Vec<String> = detect(html, |d| d.detect_ctas())
            .into_iter()
            .map(|c| c.original_text)
            .collect();
        assert_eq!(texts, ["A", "B", "C"]);
    }

    #[test]
    fn cta_cell_too_far_up_is_ignored() {
        let html = r#"<table><tr><td style="background:#f00"><div><div><div><a href="/c">C</a></div></div></div></td></tr></table>"#;
        assert!(detect(html, |d| d.detect_ctas().is_empty()));
    }

    #[test]
    fn cta_rejects_fragments_mail_and_bad_text() {
        let long = "x".repeat(101);
        let html = format!(
            r##"<a href="#top" class="btn">Top</a>
               <a href="mailto:a@b.c" class="btn">Mail</a>
               <a class="btn">No href</a>
               <a href="" class="btn">Empty href</a>
               <a href="/x" class="btn">   </a>
               <a href="/y" class="btn">{long}</a>"##
        );
        assert!(detect(&html, |d| d.detect_ctas().is_empty()));
    }

    #[test]
    fn cta_duplicates_collapse() {
        let html = r#"
            <a href="https://x.com" class="btn"> Buy </a>
            <a href="https://x.com" style="padding:4px">Buy</a>
            <a href="https://y.com" class="btn">Buy</a>
        "#;
        let ctas = detect(html, |d| d.detect_ctas());
        assert_eq!(ctas.len(), 2);
        assert_eq!(ctas[1].original_href, "https://y.com");
        assert_eq!(ctas[1].text_placeholder, "cta_2_text");
    }

    #[test]
    fn cta_skips_anchor_already_holding_placeholder() {
        let html = r#"
            <a class="btn" href="https://x.com"><h1>{{title}}</h1></a>
            <a class="btn" href="https://y.com">Shop</a>
        "#;
        let ctas = detect(html, |d| d.detect_ctas());
        assert_eq!(ctas.len(), 1);
        assert_eq!(ctas[0].original_text, "Shop");
        assert_eq!(ctas[0].text_placeholder, "cta_1_text");
    }

    // =========================================================================
    // Footer
    // =========================================================================

    #[test]
    fn footer_structural_with_keyword() {
        let html = r#"<div class="email-footer"><a href="/u">Unsubscribe</a></div>"#;
        assert!(detect(html, |d| d.detect_footer()));
    }

    #[test]
    fn footer_structural_without_keyword_falls_through() {
        let html = r#"<footer>Thanks for reading</footer>"#;
        assert!(!detect(html, |d| d.detect_footer()));
    }

    #[test]
    fn footer_fallback_needs_two_keywords() {
        let html = r#"<table><tr><td>You received this because you signed up. Unsubscribe or read our Privacy Policy.</td></tr></table>"#;
        assert!(detect(html, |d| d.detect_footer()));
        let html = r#"<table><tr><td>You received this because you signed up. Unsubscribe at any time you like.</td></tr></table>"#;
        assert!(!detect(html, |d| d.detect_footer()));
    }

    #[test]
    fn footer_russian_keywords() {
        let html = r#"<div role="contentinfo">Чтобы отписаться, нажмите здесь</div>"#;
        assert!(detect(html, |d| d.detect_footer()));
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    #[test]
    fn blocks_use_first_pattern_that_hits() {
        let html = r#"
            <div id="speakers-list">by id</div>
            <section class="main-speakers">by class</section>
            <div data-block="agenda">by data</div>
        "#;
        let names: Vec<String> = ["speakers", "agenda", "missing"].map(String::from).to_vec();
        let blocks: Vec<(String, BlockPattern, String)> = detect(html, |d| {
            d.detect_blocks(&names)
                .into_iter()
                .map(|b| (b.name, b.pattern, dom::text_content(&b.element)))
                .collect()
        });
        assert_eq!(
            blocks,
            [
                ("speakers".to_string(), BlockPattern::ClassContains, "by class".to_string()),
                ("agenda".to_string(), BlockPattern::DataBlock, "by data".to_string()),
            ]
        );
    }

    #[test]
    fn block_pattern_selectors() {
        assert_eq!(BlockPattern::ClassContains.selector("hero"), "[class*=hero]");
        assert_eq!(BlockPattern::Id.selector("hero"), "#hero");
    }

    #[test]
    fn link_parts_trims_text() {
        let doc = Document::parse(r#"<a href="/x">  Go  </a>"#);
        let a = doc.elements().into_iter().find(|n| dom::is_tag(n, "a")).unwrap();
        assert_eq!(link_parts(&a), Some(("Go".to_string(), "/x".to_string())));
    }
}
