//! Shared types passed between the adapter, renderer, and extractor.
//!
//! These are serialized to JSON with camelCase keys, which is the shape the
//! surrounding application persists adapted templates in.

use serde::{Deserialize, Serialize};

/// What kind of value a placeholder expects at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    Text,
    Url,
    Image,
    /// Boolean-gated `{{#block:name}}` section.
    Block,
    /// Array-driven `{{#each name}}` region.
    Loop,
}

/// A named substitution point discovered during adaptation.
///
/// Placeholders are listed in detection order and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placeholder {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PlaceholderKind,
    /// How the element was found, e.g. `h1` or `[class*=speakers]`.
    pub selector_hint: String,
    /// Lower-cased tag name of the element the placeholder was bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
}

impl Placeholder {
    pub fn new(name: impl Into<String>, kind: PlaceholderKind, selector_hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            selector_hint: selector_hint.into(),
            element: None,
        }
    }

    pub fn with_element(mut self, tag: impl Into<String>) -> Self {
        self.element = Some(tag.into());
        self
    }
}

/// A call-to-action anchor found by the detector.
///
/// `text_placeholder` / `url_placeholder` are the names the adapter substitutes
/// for the anchor's text and `href`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCta {
    /// Outer HTML of the first matching anchor, captured before substitution.
    pub html_snapshot: String,
    #[serde(rename = "textPlaceholderName")]
    pub text_placeholder: String,
    #[serde(rename = "urlPlaceholderName")]
    pub url_placeholder: String,
    pub original_text: String,
    pub original_href: String,
}

/// Summary facts about an adapted template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    pub suggested_subjects: Vec<String>,
    pub supports_preheader: bool,
    pub detected_ctas: Vec<DetectedCta>,
    pub detected_footer: bool,
    pub has_blocks: Vec<String>,
}

/// Result of [`crate::adapt::adapt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptedTemplate {
    /// The caller's input, untouched.
    pub original_html: String,
    /// Annotated template HTML.
    pub html: String,
    pub placeholders: Vec<Placeholder>,
    pub meta: TemplateMeta,
}

impl AdaptedTemplate {
    /// Look up a placeholder by name.
    pub fn placeholder(&self, name: &str) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.name == name)
    }
}

/// Output of [`crate::render::render`]. `text` is always derived from `html`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub html: String,
    pub text: String,
}

/// Outcome of [`crate::extract::validate`]. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub placeholders: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
}
