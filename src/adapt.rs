//! Template adaptation: finished email HTML in, placeholder template out.
//!
//! ## Pipeline
//!
//! One [`Document`] is parsed per call and threaded through a fixed sequence
//! of stages. Each stage takes the [`Adaptation`] by value and returns it, so
//! ownership of the tree is never ambiguous:
//!
//! ```text
//! preheader → title → ctas → blocks → brand → comments → finish
//! ```
//!
//! Order matters. Later stages run their detectors against the tree as the
//! earlier stages left it: the CTA scan sees `{{title}}` rather than the
//! original heading text, the block scan sees substituted anchors, and the
//! brand scan never re-matches a placeholder.
//!
//! ## Output Invariant
//!
//! Every placeholder recorded appears in the returned HTML, either as
//! `{{name}}` or as a `{{#block:name}}…{{/block:name}}` pair. Stages only
//! record a placeholder after the substitution actually happened.

use crate::config::{AdaptOptions, CtaStrategy, is_valid_block_name};
use crate::detect::Detector;
use crate::dom::{self, Document};
use crate::types::{AdaptedTemplate, DetectedCta, Placeholder, PlaceholderKind, TemplateMeta};
use markup5ever_rcdom::Handle;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Hidden block prepended to `<body>` when the email has no preheader.
const FALLBACK_PREHEADER: &str = "<div style=\"display:none;font-size:1px;line-height:1px;\
max-height:0px;max-width:0px;opacity:0;overflow:hidden;color:transparent;mso-hide:all;\">\
{{preheader}}</div>";

const FALLBACK_PREHEADER_HINT: &str = "body > div:first-child";

/// Most CTAs the `auto` strategy keeps.
const AUTO_CTA_LIMIT: usize = 3;

/// A contact detail replaced by a canonical brand placeholder.
struct BrandPattern {
    placeholder: &'static str,
    regex: Regex,
}

/// Tried in order; several patterns may share a placeholder.
static BRAND_PATTERNS: LazyLock<Vec<BrandPattern>> = LazyLock::new(|| {
    vec![
        BrandPattern {
            placeholder: "brand.phone",
            regex: Regex::new(r"(?:\+7|\b8)[\s\-]?\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{2}[\s\-]?\d{2}\b")
                .expect("ru phone regex"),
        },
        BrandPattern {
            placeholder: "brand.phone",
            regex: Regex::new(r"\+\d{1,3}[\s\-]?\(?\d{1,4}\)?(?:[\s\-]?\d{2,4}){2,4}\b")
                .expect("intl phone regex"),
        },
        BrandPattern {
            placeholder: "brand.support",
            regex: Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")
                .expect("email regex"),
        },
    ]
});

/// Convert email HTML into an annotated template.
///
/// Never fails: malformed markup is parsed leniently and every detection
/// miss just means fewer placeholders.
pub fn adapt(html: &str, options: &AdaptOptions) -> AdaptedTemplate {
    Adaptation::new(html, options)
        .preheader()
        .title()
        .ctas()
        .blocks()
        .brand_contacts()
        .comments()
        .finish()
}

/// In-progress adaptation: the owned document plus everything recorded so far.
pub struct Adaptation<'o> {
    original_html: String,
    doc: Document,
    options: &'o AdaptOptions,
    placeholders: Vec<Placeholder>,
    supports_preheader: bool,
    has_title: bool,
    processed_ctas: Vec<DetectedCta>,
    wrapped_blocks: Vec<String>,
}

fn tag_of(node: &Handle) -> String {
    dom::tag_name(node).unwrap_or_default().to_ascii_lowercase()
}

impl<'o> Adaptation<'o> {
    pub fn new(html: &str, options: &'o AdaptOptions) -> Self {
        Self {
            original_html: html.to_string(),
            doc: Document::parse(html),
            options,
            placeholders: Vec::new(),
            supports_preheader: false,
            has_title: false,
            processed_ctas: Vec::new(),
            wrapped_blocks: Vec::new(),
        }
    }

    fn record(&mut self, placeholder: Placeholder) {
        if !self.placeholders.iter().any(|p| p.name == placeholder.name) {
            self.placeholders.push(placeholder);
        }
    }

    pub fn preheader(mut self) -> Self {
        if let Some(element) = Detector::new(&self.doc).detect_preheader() {
            let tag = tag_of(&element);
            dom::set_text(&element, "{{preheader}}");
            debug!(tag = %tag, "replaced detected preheader");
            self.record(Placeholder::new("preheader", PlaceholderKind::Text, &tag).with_element(tag));
            self.supports_preheader = true;
        } else if self.options.preheader_fallback {
            let inserted = match (self.doc.body(), dom::element_from_html(FALLBACK_PREHEADER)) {
                (Some(body), Some(block)) => {
                    dom::prepend_child(&body, block);
                    true
                }
                _ => false,
            };
            if inserted {
                debug!("no preheader found, inserted hidden fallback block");
                self.record(
                    Placeholder::new("preheader", PlaceholderKind::Text, FALLBACK_PREHEADER_HINT)
                        .with_element("div"),
                );
                self.supports_preheader = true;
            }
        } else {
            debug!("no preheader found, fallback disabled");
        }
        self
    }

    pub fn title(mut self) -> Self {
        if let Some(element) = Detector::new(&self.doc).detect_title() {
            let tag = tag_of(&element);
            dom::set_text(&element, "{{title}}");
            debug!(tag = %tag, "replaced title");
            self.record(Placeholder::new("title", PlaceholderKind::Text, &tag).with_element(tag));
            self.has_title = true;
        }
        self
    }

    pub fn ctas(mut self) -> Self {
        let detected = Detector::new(&self.doc).detect_ctas();
        let found = detected.len();
        for cta in select_ctas(detected, self.options.cta_strategy) {
            let replaced = replace_cta_anchors(&self.doc, &cta);
            debug!(
                text = %cta.original_text,
                href = %cta.original_href,
                anchors = replaced,
                "replaced cta"
            );
            self.record(
                Placeholder::new(&cta.text_placeholder, PlaceholderKind::Text, "a").with_element("a"),
            );
            self.record(
                Placeholder::new(&cta.url_placeholder, PlaceholderKind::Url, "a").with_element("a"),
            );
            self.processed_ctas.push(cta);
        }
        debug!(
            found,
            processed = self.processed_ctas.len(),
            strategy = ?self.options.cta_strategy,
            "cta stage done"
        );
        self
    }

    /// Wrap named blocks in section tags. Names that could not round-trip
    /// through a `{{#block:NAME}}` tag are skipped.
    pub fn blocks(mut self) -> Self {
        let (names, rejected): (Vec<String>, Vec<String>) = self
            .options
            .detect_blocks
            .iter()
            .cloned()
            .partition(|name| is_valid_block_name(name));
        if !rejected.is_empty() {
            debug!(?rejected, "skipping invalid block names");
        }
        let blocks = Detector::new(&self.doc).detect_blocks(&names);
        for block in blocks {
            dom::insert_before(&block.element, dom::text_node(&format!("{{{{#block:{}}}}}", block.name)));
            dom::insert_after(&block.element, dom::text_node(&format!("{{{{/block:{}}}}}", block.name)));
            debug!(name = %block.name, pattern = ?block.pattern, "wrapped block");
            self.record(
                Placeholder::new(&block.name, PlaceholderKind::Block, block.pattern.selector(&block.name))
                    .with_element(tag_of(&block.element)),
            );
            self.wrapped_blocks.push(block.name);
        }
        self
    }

    /// Replace brand contact details (phone, support address).
    ///
    /// Every pattern searches the body as it was when this stage started, and
    /// only its first match is taken; every literal occurrence of that exact
    /// text is then replaced. A second, different number in the same email
    /// is left as-is.
    pub fn brand_contacts(mut self) -> Self {
        let Some(body) = self.doc.body() else {
            return self;
        };
        let serialized = dom::inner_html(&body);
        for pattern in BRAND_PATTERNS.iter() {
            let Some(found) = pattern.regex.find(&serialized) else {
                continue;
            };
            let literal = found.as_str();
            let replacement = format!("{{{{{}}}}}", pattern.placeholder);
            let count = dom::replace_literal(&body, literal, &replacement);
            if count == 0 {
                debug!(literal, placeholder = pattern.placeholder, "brand match already replaced or spans markup");
                continue;
            }
            debug!(literal, placeholder = pattern.placeholder, count, "replaced brand contact");
            self.record(Placeholder::new(pattern.placeholder, PlaceholderKind::Text, "body"));
        }
        self
    }

    pub fn comments(self) -> Self {
        if !self.options.preserve_comments {
            self.doc.strip_comments();
        }
        self
    }

    pub fn finish(self) -> AdaptedTemplate {
        let detected_footer = Detector::new(&self.doc).detect_footer();
        let suggested_subjects = if self.has_title {
            vec!["{{title}}".to_string()]
        } else {
            Vec::new()
        };
        AdaptedTemplate {
            original_html: self.original_html,
            html: self.doc.to_html(),
            placeholders: self.placeholders,
            meta: TemplateMeta {
                suggested_subjects,
                supports_preheader: self.supports_preheader,
                detected_ctas: self.processed_ctas,
                detected_footer,
                has_blocks: self.wrapped_blocks,
            },
        }
    }
}

/// Pick which detected CTAs become placeholders.
pub fn select_ctas(mut ctas: Vec<DetectedCta>, strategy: CtaStrategy) -> Vec<DetectedCta> {
    match strategy {
        CtaStrategy::TopBottom if ctas.len() >= 2 => {
            let last = ctas.pop();
            let first = ctas.into_iter().next();
            first
                .map(|c| rename_cta(c, "top"))
                .into_iter()
                .chain(last.map(|c| rename_cta(c, "bottom")))
                .collect()
        }
        CtaStrategy::All => ctas,
        CtaStrategy::TopBottom | CtaStrategy::Auto => {
            ctas.truncate(AUTO_CTA_LIMIT);
            ctas
        }
    }
}

fn rename_cta(mut cta: DetectedCta, position: &str) -> DetectedCta {
    cta.text_placeholder = format!("cta_{position}_text");
    cta.url_placeholder = format!("cta_{position}_url");
    cta
}

/// Substitute every anchor whose trimmed text and `href` equal the CTA's
/// originals. Returns how many anchors changed.
fn replace_cta_anchors(doc: &Document, cta: &DetectedCta) -> usize {
    let text = format!("{{{{{}}}}}", cta.text_placeholder);
    let url = format!("{{{{{}}}}}", cta.url_placeholder);
    let mut replaced = 0;
    for anchor in doc.elements().iter().filter(|n| dom::is_tag(n, "a")) {
        let same_href = dom::attr(anchor, "href").as_deref() == Some(cta.original_href.as_str());
        if same_href && dom::text_content(anchor).trim() == cta.original_text {
            dom::set_text(anchor, &text);
            dom::set_attr(anchor, "href", &url);
            replaced += 1;
        }
    }
    replaced
}
