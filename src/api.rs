//! Request/response shapes for the four engine operations.
//!
//! A transport layer (HTTP handler, queue consumer, ...) deserializes one of
//! the request types below and hands it to the matching `*_request`
//! function. Those functions own the only failure class of the engine:
//! required fields that are absent or empty, inputs over the configured size
//! cap, and adapt options that fail validation. Everything past that check
//! is infallible.
//!
//! Wire names are camelCase:
//!
//! ```json
//! {"html": "<html>…</html>", "options": {"ctaStrategy": "top_bottom"}}
//! {"template": "<p>{{name}}</p>", "data": {"name": "Ann"}}
//! ```

use crate::adapt::adapt;
use crate::config::{AdaptOptions, LimitsConfig};
use crate::extract::{extract, validate};
use crate::render::render;
use crate::types::{AdaptedTemplate, RenderResult, ValidationReport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("input too large: {size} bytes (limit {limit})")]
    InputTooLarge { size: usize, limit: usize },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptRequest {
    pub html: Option<String>,
    /// Absent fields fall back to [`AdaptOptions::default`].
    pub options: Option<AdaptOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub template: Option<String>,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub template: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Borrow a required string field, rejecting absent, empty, or oversized input.
fn require<'a>(
    value: &'a Option<String>,
    field: &'static str,
    limits: &LimitsConfig,
) -> Result<&'a str, RequestError> {
    let value = match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return Err(RequestError::MissingField(field)),
    };
    check_size(value.len(), limits)?;
    Ok(value)
}

/// Reject inputs over `limits.max_input_bytes`.
pub fn check_size(size: usize, limits: &LimitsConfig) -> Result<(), RequestError> {
    if size > limits.max_input_bytes {
        return Err(RequestError::InputTooLarge {
            size,
            limit: limits.max_input_bytes,
        });
    }
    Ok(())
}

pub fn adapt_request(
    request: &AdaptRequest,
    limits: &LimitsConfig,
) -> Result<AdaptedTemplate, RequestError> {
    let html = require(&request.html, "html", limits)?;
    let options = request.options.clone().unwrap_or_default();
    options
        .validate()
        .map_err(|e| RequestError::InvalidOptions(e.to_string()))?;
    debug!(bytes = html.len(), "adapt request");
    Ok(adapt(html, &options))
}

pub fn render_request(
    request: &RenderRequest,
    limits: &LimitsConfig,
) -> Result<RenderResult, RequestError> {
    let template = require(&request.template, "template", limits)?;
    debug!(bytes = template.len(), "render request");
    Ok(render(template, &request.data))
}

pub fn extract_request(
    request: &ExtractRequest,
    limits: &LimitsConfig,
) -> Result<ExtractResponse, RequestError> {
    let template = require(&request.template, "template", limits)?;
    Ok(ExtractResponse {
        placeholders: extract(template),
    })
}

pub fn validate_request(
    request: &ValidateRequest,
    limits: &LimitsConfig,
) -> Result<ValidationReport, RequestError> {
    let template = require(&request.template, "template", limits)?;
    Ok(validate(template))
}
