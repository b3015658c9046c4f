//! Detection results on realistic emails.

use mailmold::{AdaptOptions, CtaStrategy, PlaceholderKind, adapt};
use std::path::Path;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/emails")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

// =========================================================================
// conference.html
// =========================================================================

#[test]
fn conference_detects_hidden_preheader() {
    let t = adapt(&fixture("conference.html"), &AdaptOptions::default());
    let preheader = t.placeholder("preheader").unwrap();
    assert_eq!(preheader.selector_hint, "div");
    assert!(!t.html.contains("Early-bird tickets end Friday"));
    assert!(t.meta.supports_preheader);
}

#[test]
fn conference_auto_keeps_first_three_ctas() {
    let t = adapt(&fixture("conference.html"), &AdaptOptions::default());
    let texts: Vec<&str> = t.meta.detected_ctas.iter().map(|c| c.original_text.as_str()).collect();
    assert_eq!(texts, ["Register now", "View full agenda", "Book a hotel"]);
    // both "Register now" buttons share cta_1
    assert_eq!(t.html.matches("{{cta_1_text}}").count(), 2);
    // fourth CTA is left alone
    assert!(t.html.contains("Become a sponsor"));
    assert!(t.placeholder("cta_4_text").is_none());
}

#[test]
fn conference_all_strategy_keeps_sponsor_link() {
    let options = AdaptOptions {
        cta_strategy: CtaStrategy::All,
        ..Default::default()
    };
    let t = adapt(&fixture("conference.html"), &options);
    assert_eq!(t.meta.detected_ctas.len(), 4);
    assert!(!t.html.contains("Become a sponsor"));
}

#[test]
fn conference_top_bottom_names_first_and_last() {
    let options = AdaptOptions {
        cta_strategy: CtaStrategy::TopBottom,
        ..Default::default()
    };
    let t = adapt(&fixture("conference.html"), &options);
    let top = &t.meta.detected_ctas[0];
    let bottom = &t.meta.detected_ctas[1];
    assert_eq!(top.text_placeholder, "cta_top_text");
    assert_eq!(top.original_text, "Register now");
    assert_eq!(bottom.url_placeholder, "cta_bottom_url");
    assert_eq!(bottom.original_text, "Become a sponsor");
    assert!(t.html.contains("View full agenda"));
}

#[test]
fn conference_wraps_all_default_blocks() {
    let t = adapt(&fixture("conference.html"), &AdaptOptions::default());
    assert_eq!(t.meta.has_blocks, ["speakers", "agenda", "hero", "footer"]);
    assert_eq!(t.placeholder("agenda").unwrap().selector_hint, "[id*=agenda]");
    assert_eq!(t.placeholder("speakers").unwrap().element.as_deref(), Some("table"));
    assert!(t.meta.detected_footer);
}

#[test]
fn conference_brand_contacts() {
    let t = adapt(&fixture("conference.html"), &AdaptOptions::default());
    assert!(t.html.contains("Call {{brand.phone}}"));
    assert!(t.html.contains(r#"href="mailto:{{brand.support}}""#));
    assert!(!t.html.contains("support@mailmold.dev"));
    let brand = t.placeholder("brand.support").unwrap();
    assert_eq!(brand.kind, PlaceholderKind::Text);
    assert_eq!(brand.selector_hint, "body");
}

#[test]
fn conference_comments_stripped_unless_preserved() {
    let html = fixture("conference.html");
    let stripped = adapt(&html, &AdaptOptions::default());
    assert!(!stripped.html.contains("<!--"));

    let options = AdaptOptions {
        preserve_comments: true,
        ..Default::default()
    };
    let kept = adapt(&html, &options);
    assert!(kept.html.contains("<!--[if mso]>"));
}

// =========================================================================
// webinar_ru.html
// =========================================================================

#[test]
fn webinar_gets_fallback_preheader_and_headline_title() {
    let t = adapt(&fixture("webinar_ru.html"), &AdaptOptions::default());
    assert_eq!(
        t.placeholder("preheader").unwrap().selector_hint,
        "body > div:first-child"
    );
    assert_eq!(t.placeholder("title").unwrap().selector_hint, "h2");
    assert!(t.html.contains(r#"<h2 class="headline">{{title}}</h2>"#));
}

#[test]
fn webinar_cta_from_styled_cell() {
    let t = adapt(&fixture("webinar_ru.html"), &AdaptOptions::default());
    assert_eq!(t.meta.detected_ctas.len(), 1);
    assert_eq!(t.meta.detected_ctas[0].original_text, "Зарегистрироваться");
    assert!(!t.html.contains("Зарегистрироваться"));
}

#[test]
fn webinar_data_block_and_russian_footer() {
    let t = adapt(&fixture("webinar_ru.html"), &AdaptOptions::default());
    assert_eq!(t.meta.has_blocks, ["speakers"]);
    assert_eq!(
        t.placeholder("speakers").unwrap().selector_hint,
        "[data-block=speakers]"
    );
    assert!(t.meta.detected_footer);
}

#[test]
fn webinar_russian_hotline_and_address() {
    let t = adapt(&fixture("webinar_ru.html"), &AdaptOptions::default());
    assert!(t.html.contains("Горячая линия: {{brand.phone}}"));
    assert!(t.html.contains("почта {{brand.support}}"));
}

#[test]
fn disabled_fallback_reports_no_preheader() {
    let options = AdaptOptions {
        preheader_fallback: false,
        ..Default::default()
    };
    let t = adapt(&fixture("webinar_ru.html"), &options);
    assert!(!t.meta.supports_preheader);
    assert!(t.placeholder("preheader").is_none());
    assert!(!t.html.contains("{{preheader}}"));
}
