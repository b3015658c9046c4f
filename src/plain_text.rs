//! HTML to plain text, for the `text/plain` part of a multipart email.
//!
//! Operates on the rendered HTML string with a fixed series of regex
//! rewrites rather than a DOM walk; rendered output may be any fragment, and
//! the rewrites only need to be predictable, not layout-accurate.
//!
//! 1. drop `<style>`, `<script>`, `<noscript>` with their content, and comments
//! 2. `<img alt="X">` → `[X]`; images without alt text disappear
//! 3. `<a href="U">T</a>` → `T (U)`, or just `T` without an href
//! 4. `<br>` → newline; newline after closing `p`, `div`, `h1`-`h6`, `li`,
//!    `tr`; space after closing `td`/`th`
//! 5. strip the remaining tags, decode entities
//! 6. collapse space runs, drop spaces around newlines, cap blank lines at one,
//!    trim

use regex::{Captures, Regex};
use std::sync::LazyLock;

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(stringify!($name)));
    };
}

lazy_regex!(STYLE_RE, r"(?is)<style\b[^>]*>.*?</style\s*>");
lazy_regex!(SCRIPT_RE, r"(?is)<script\b[^>]*>.*?</script\s*>");
lazy_regex!(NOSCRIPT_RE, r"(?is)<noscript\b[^>]*>.*?</noscript\s*>");
lazy_regex!(COMMENT_RE, r"(?s)<!--.*?-->");
lazy_regex!(IMG_RE, r"(?i)<img\b[^>]*>");
lazy_regex!(ANCHOR_RE, r"(?is)<a\b([^>]*)>(.*?)</a\s*>");
lazy_regex!(BR_RE, r"(?i)<br\s*/?>");
lazy_regex!(BLOCK_END_RE, r"(?i)</(?:p|div|h[1-6]|li|tr)\s*>");
lazy_regex!(CELL_END_RE, r"(?i)</t[dh]\s*>");
lazy_regex!(TAG_RE, r"<[^>]+>");
lazy_regex!(SPACES_RE, r"[ \t]+");
lazy_regex!(NEWLINE_PAD_RE, r"[ \t]*\n[ \t]*");
lazy_regex!(BLANK_LINES_RE, r"\n{3,}");
lazy_regex!(ALT_RE, r#"(?i)(?:^|\s)alt\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#);
lazy_regex!(HREF_RE, r#"(?i)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#);

/// First quoted or bare value captured by an attribute regex.
fn attr_value(re: &Regex, tag: &str) -> Option<String> {
    let caps = re.captures(tag)?;
    (1..=3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

fn image_to_text(caps: &Captures) -> String {
    match attr_value(&ALT_RE, &caps[0]) {
        Some(alt) if !alt.trim().is_empty() => format!("[{}]", alt.trim()),
        _ => String::new(),
    }
}

fn anchor_to_text(caps: &Captures) -> String {
    let text = TAG_RE.replace_all(&caps[2], "");
    let text = text.trim();
    match attr_value(&HREF_RE, &caps[1]) {
        Some(href) if !href.is_empty() => format!("{text} ({href})"),
        _ => text.to_string(),
    }
}

/// Derive the plain-text version of rendered email HTML.
pub fn html_to_text(html: &str) -> String {
    let text = html.replace("\r\n", "\n");
    let text = STYLE_RE.replace_all(&text, "");
    let text = SCRIPT_RE.replace_all(&text, "");
    let text = NOSCRIPT_RE.replace_all(&text, "");
    let text = COMMENT_RE.replace_all(&text, "");
    let text = IMG_RE.replace_all(&text, image_to_text);
    let text = ANCHOR_RE.replace_all(&text, anchor_to_text);
    let text = BR_RE.replace_all(&text, "\n");
    let text = BLOCK_END_RE.replace_all(&text, "\n");
    let text = CELL_END_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text).replace('\u{a0}', " ");
    let text = SPACES_RE.replace_all(&text, " ");
    let text = NEWLINE_PAD_RE.replace_all(&text, "\n");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}
