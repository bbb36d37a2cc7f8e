//! Text, title and link extraction from parsed HTML.

use std::sync::LazyLock;

use pagedigest_shared::Link;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text content makes up the readable body of a page.
pub const TEXT_ELEMENTS: &str = "p, h1, h2, h3, h4, h5, h6, a, td, th, tr, pre, code, blockquote";

static TEXT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(TEXT_ELEMENTS).expect("valid selector"));
static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static H1_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Extract the readable text of a document, one element per line.
///
/// Elements nested inside another text element (an `<a>` inside a `<p>`)
/// are not emitted again. Whitespace inside each element is collapsed.
pub fn extract_text(doc: &Html) -> String {
    let mut lines = Vec::new();

    for el in doc.select(&TEXT_SEL) {
        if has_text_ancestor(&el) {
            continue;
        }
        let text = collapse(&el.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            lines.push(text);
        }
    }

    lines.join("\n")
}

/// Page title from `<title>`, falling back to the first `<h1>`.
pub fn extract_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .chain(doc.select(&H1_SEL))
        .map(|el| collapse(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Extract all links from a document, resolved against the base URL.
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<Link> {
    let mut links = Vec::new();

    for el in doc.select(&LINK_SEL) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };

        // Skip anchors, javascript:, mailto:
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:")
        {
            continue;
        }

        if let Ok(mut resolved) = base_url.join(href) {
            resolved.set_fragment(None);
            links.push(Link {
                text: collapse(&el.text().collect::<String>()),
                href: resolved.to_string(),
            });
        }
    }

    links
}

/// Strip surrounding single quotes left over from shell quoting.
pub fn clean_url(raw: &str) -> &str {
    raw.trim().trim_matches('\'')
}

fn has_text_ancestor(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| TEXT_SEL.matches(&a))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
