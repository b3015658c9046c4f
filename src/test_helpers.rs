//! Shared test utilities for the mailmold test suite.
//!
//! Fixture loaders plus lookup helpers that panic with the available names
//! on a miss, so a failing assertion says what was there instead.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let t = adapt(&load_fixture("conference.html"), &AdaptOptions::default());
//! let title = find_placeholder(&t, "title");
//! assert_eq!(title.selector_hint, "h1");
//! assert_placeholders_present(&t);
//! ```

use std::path::{Path, PathBuf};

use crate::types::{AdaptedTemplate, Placeholder, PlaceholderKind};

// =========================================================================
// Fixtures
// =========================================================================

/// Directory holding the sample emails.
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/emails")
}

/// Read `fixtures/emails/<name>`. Panics if missing.
pub fn load_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("fixture {} not readable: {e}", path.display()))
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a placeholder by name. Panics if not found.
pub fn find_placeholder<'a>(template: &'a AdaptedTemplate, name: &str) -> &'a Placeholder {
    template.placeholder(name).unwrap_or_else(|| {
        let names = placeholder_names(template);
        panic!("placeholder '{name}' not found. Available: {names:?}")
    })
}

/// Names of all recorded placeholders, in recording order.
pub fn placeholder_names(template: &AdaptedTemplate) -> Vec<&str> {
    template.placeholders.iter().map(|p| p.name.as_str()).collect()
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert every recorded placeholder occurs in the adapted HTML: `{{name}}`
/// for values, an opening and closing tag pair for blocks.
pub fn assert_placeholders_present(template: &AdaptedTemplate) {
    for p in &template.placeholders {
        match p.kind {
            PlaceholderKind::Block => {
                let open = format!("{{{{#block:{}}}}}", p.name);
                let close = format!("{{{{/block:{}}}}}", p.name);
                assert!(
                    template.html.contains(&open) && template.html.contains(&close),
                    "block '{}' not wrapped in output",
                    p.name
                );
            }
            _ => {
                let token = format!("{{{{{}}}}}", p.name);
                assert!(
                    template.html.contains(&token),
                    "placeholder '{}' recorded but {token} missing from output",
                    p.name
                );
            }
        }
    }
}
