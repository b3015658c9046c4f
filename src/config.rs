//! Engine configuration.
//!
//! Handles loading, validating, and merging `mailmold.toml`. Stock defaults are
//! the base layer; a `mailmold.toml` in the config directory overrides any
//! subset of keys; CLI flags override last.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [adapt]
//! detect_blocks = ["speakers", "agenda", "hero", "footer"]
//! cta_strategy = "auto"      # "auto" | "all" | "top_bottom"
//! preheader_fallback = true
//! preserve_comments = false
//!
//! [limits]
//! max_input_bytes = 2097152  # Inputs above this are rejected before parsing
//!
//! [processing]
//! max_processes = 4          # Batch workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! The `[adapt]` table doubles as the `options` object of an adapt request.
//! On the JSON wire its keys are also accepted in camelCase
//! (`detectBlocks`, `ctaStrategy`, ...).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = "mailmold.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `mailmold.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Defaults for every adapt call.
    pub adapt: AdaptOptions,
    /// Input size caps applied before the engine runs.
    pub limits: LimitsConfig,
    /// Worker pool for batch adaptation.
    pub processing: ProcessingConfig,
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adapt.validate()?;
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_input_bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Which detected CTAs the adapter turns into placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaStrategy {
    /// First and last CTA, named `cta_top_*` / `cta_bottom_*`. Needs at least
    /// two CTAs; otherwise behaves like `Auto`.
    TopBottom,
    /// Every detected CTA.
    All,
    /// At most the first three.
    #[default]
    Auto,
}

/// Options for [`crate::adapt::adapt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptOptions {
    /// Block names to look for and wrap in `{{#block:name}}` sections.
    #[serde(alias = "detectBlocks")]
    pub detect_blocks: Vec<String>,
    #[serde(alias = "ctaStrategy")]
    pub cta_strategy: CtaStrategy,
    /// Insert a hidden `{{preheader}}` block when none is detected.
    #[serde(alias = "preheaderFallback")]
    pub preheader_fallback: bool,
    /// Keep HTML comments (conditional comments for Outlook, mostly).
    #[serde(alias = "preserveComments")]
    pub preserve_comments: bool,
}

pub fn default_block_names() -> Vec<String> {
    ["speakers", "agenda", "hero", "footer"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            detect_blocks: default_block_names(),
            cta_strategy: CtaStrategy::default(),
            preheader_fallback: true,
            preserve_comments: false,
        }
    }
}

/// Block names end up inside `{{#block:NAME}}` tags, so they must be plain
/// identifiers: ASCII letters, digits, `_` or `-`, at least one of them.
pub fn is_valid_block_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl AdaptOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.detect_blocks {
            if !is_valid_block_name(name) {
                return Err(ConfigError::Validation(format!(
                    "adapt.detect_blocks: invalid block name {name:?} (use letters, digits, '_' or '-')"
                )));
            }
        }
        Ok(())
    }
}

/// Input size caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest HTML or template accepted, in bytes.
    pub max_input_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base layer for merging.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(EngineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `mailmold.toml` from a directory as a raw TOML value.
///
/// `Ok(None)` when the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `mailmold.toml` in `dir`, on top of stock defaults.
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// A fully-commented stock `mailmold.toml`. Used by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# mailmold configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys are an error.

# ---------------------------------------------------------------------------
# Adaptation (turning a finished email into a template)
# ---------------------------------------------------------------------------
[adapt]
# Named regions to wrap in {{#block:NAME}}...{{/block:NAME}} sections.
# Each name is matched against class, id and data-block attributes.
detect_blocks = ["speakers", "agenda", "hero", "footer"]

# Which button-like links become {{cta_*}} placeholders:
#   "auto"       - the first three
#   "all"        - every one
#   "top_bottom" - first and last, as cta_top_* and cta_bottom_*
cta_strategy = "auto"

# Insert a hidden {{preheader}} block when the email has none.
preheader_fallback = true

# Keep HTML comments (e.g. Outlook conditional comments).
preserve_comments = false

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest HTML or template accepted, in bytes.
max_input_bytes = 2097152

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for adapt-dir.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
