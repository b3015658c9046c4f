//! # mailmold
//!
//! Turns finished, one-off email HTML into reusable templates, and renders
//! those templates back into sendable HTML plus a plain-text part.
//!
//! # Architecture: Two Independent Directions
//!
//! ```text
//! adapt    email HTML  →  AdaptedTemplate   (detect, then substitute placeholders)
//! render   template + JSON data  →  { html, text }
//! extract  template  →  placeholder names   (and validate, built on it)
//! ```
//!
//! Adaptation parses the email once into an owned DOM, runs read-only
//! heuristics over it, and rewrites the tree stage by stage. Rendering never
//! touches a DOM: it is a fixed chain of string transforms over a tiny
//! template language. The only contract between the two is the placeholder
//! syntax itself, which is what gets persisted.
//!
//! Every operation is a pure, synchronous function over in-memory strings.
//! Independent calls share nothing and can run on any thread.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Serializable shapes shared by all operations (`AdaptedTemplate`, `Placeholder`, ...) |
//! | [`dom`] | Owned html5ever document: lenient parsing, traversal, mutation, serialization |
//! | [`detect`] | Heuristic element detection: preheader, title, CTAs, footer, named blocks |
//! | [`adapt`] | Adaptation pipeline that turns detections into placeholders |
//! | [`render`] | Block, loop, and scalar substitution stages |
//! | [`plain_text`] | Rendered HTML to plain text |
//! | [`extract`] | Placeholder extraction and validation |
//! | [`api`] | Request/response types and input checks for all four operations |
//! | [`config`] | `mailmold.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Heuristics as Predicate Lists
//!
//! Each detector is an ordered list of plain `fn(&Handle) -> bool` checks
//! evaluated with short-circuiting. Adding a heuristic means adding a list
//! entry; nothing else has to change, and each predicate is testable alone.
//!
//! ## Infallible Core
//!
//! `adapt`, `render`, `extract`, and `validate` return values, not `Result`s.
//! Malformed markup is parsed leniently, detection misses show up as fewer
//! placeholders, and template/data mismatches are cleaned up at render time.
//! The only rejections are missing or oversized input, checked in [`api`]
//! before the engine runs.
//!
//! ## No Escaping on Substitution
//!
//! Rendered values are inserted verbatim. Data comes from the template owner,
//! and brand fields routinely contain markup.

pub mod adapt;
pub mod api;
pub mod config;
pub mod detect;
pub mod dom;
pub mod extract;
pub mod output;
pub mod plain_text;
pub mod render;
pub mod types;

pub use adapt::adapt;
pub use config::{AdaptOptions, CtaStrategy};
pub use extract::{extract, validate};
pub use render::render;
pub use types::{AdaptedTemplate, Placeholder, PlaceholderKind, RenderResult, ValidationReport};

#[cfg(test)]
pub(crate) mod test_helpers;
