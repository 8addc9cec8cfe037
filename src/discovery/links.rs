//! Anchor and `<link>` scanning over fetched HTML.
//!
//! Every function parses its input and drops the tree before returning, so
//! callers can hold the results across `.await`.

use super::keywords::{is_skipped_host, matches_friend_keyword, FRIEND_LINK_KEYWORDS};
use crate::util::{authority, collapse_whitespace, is_public_url, resolve_url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::error!(selector = css, error = ?e, "Invalid built-in selector");
            None
        }
    }
}

/// Hrefs that never lead to a page.
fn is_inert_href(href: &str) -> bool {
    let href = href.trim().to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
}

/// First anchor whose text or href matches a friend-links keyword, resolved
/// against `base`.
pub fn find_friend_link(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    document.select(&anchors).find_map(|anchor| {
        let href = anchor.value().attr("href")?;
        if is_inert_href(href) {
            return None;
        }
        let text = collapse_whitespace(&anchor.text().collect::<String>());
        if !matches_friend_keyword(&text, href, &FRIEND_LINK_KEYWORDS) {
            return None;
        }
        let resolved = resolve_url(href, base);
        (!resolved.is_empty()).then_some(resolved)
    })
}

/// Outbound http(s) links on a page, in document order.
///
/// Links whose host and port match `homepage_authority` are internal and dropped,
/// as are skip-listed hosts and, with `block_private`, anything the SSRF guard
/// rejects. Fragments are stripped before deduplication.
pub fn extract_external_links(
    html: &str,
    base: &str,
    homepage_authority: &str,
    block_private: bool,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in document
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
    {
        if is_inert_href(href) {
            continue;
        }
        let Ok(mut url) = Url::parse(&resolve_url(href, base)) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);

        let Some(candidate_authority) = authority(&url) else {
            continue;
        };
        if candidate_authority.eq_ignore_ascii_case(homepage_authority) {
            continue;
        }
        if url.host_str().is_some_and(is_skipped_host) {
            continue;
        }
        if block_private && !is_public_url(&url) {
            tracing::debug!(url = %url, "Skipping non-public candidate link");
            continue;
        }

        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

/// Feed advertised by `<link type="...xml..." href="...">`, resolved against `base`.
pub fn find_feed_link(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let links = selector("link[type][href]")?;

    document.select(&links).find_map(|link| {
        let element = link.value();
        let kind = element.attr("type")?.to_ascii_lowercase();
        if !kind.contains("xml") {
            return None;
        }
        let resolved = resolve_url(element.attr("href")?, base);
        (!resolved.is_empty()).then_some(resolved)
    })
}
