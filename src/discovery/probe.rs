//! Locating and validating a candidate site's feed.

use super::links::find_feed_link;
use crate::http::HttpClient;
use crate::util::{is_public_url, origin, resolve_url};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use url::Url;

/// Conventional feed locations, probed against the site origin.
pub const COMMON_FEED_PATHS: &[&str] = &[
    "/rss.xml",
    "/feed",
    "/atom.xml",
    "/feed.xml",
    "/index.xml",
    "/rss",
    "/feed/",
    "/atom",
    "/rss2.xml",
    // WordPress
    "/?feed=rss2",
    "/index.php/feed/",
    // Blogger
    "/feeds/posts/default",
    // Ghost, Jekyll and subdirectory blogs
    "/rss/",
    "/blog/feed",
    "/blog/rss.xml",
];

/// Bytes of a GET body inspected when the content type is inconclusive.
const SNIFF_BYTES: usize = 1024;

const FEED_MARKERS: &[&str] = &["<?xml", "<rss", "<feed", "<atom"];

fn is_feed_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    // application/xhtml+xml is a web page
    !ct.contains("xhtml") && (ct.contains("xml") || ct.contains("rss") || ct.contains("atom"))
}

/// Whether a response looks like a feed, by content type or by the leading bytes.
pub fn looks_like_feed(content_type: Option<&str>, prefix: &[u8]) -> bool {
    if content_type.is_some_and(is_feed_content_type) {
        return true;
    }
    let head = String::from_utf8_lossy(&prefix[..prefix.len().min(SNIFF_BYTES)]).to_lowercase();
    FEED_MARKERS.iter().any(|marker| head.contains(marker))
}

/// HEAD first; a 200 with a feed content type settles it. Otherwise GET and
/// sniff. Network errors count as "not a feed".
pub(crate) async fn validate_feed_url(http: &HttpClient, url: &str) -> bool {
    match http.head(url).await {
        Ok(probe) if probe.status == 200 && probe.content_type.as_deref().is_some_and(is_feed_content_type) => {
            return true;
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(url = %url, error = %e, "HEAD probe failed"),
    }

    match http.get_prefix(url, SNIFF_BYTES).await {
        Ok(probe) if (200..300).contains(&probe.status) => {
            looks_like_feed(probe.content_type.as_deref(), &probe.prefix)
        }
        Ok(probe) => {
            tracing::trace!(url = %url, status = probe.status, "Probe rejected");
            false
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "GET probe failed");
            false
        }
    }
}

/// Finds a working feed for the site at `page_url`.
///
/// The page's advertised `<link>` wins when it validates; otherwise the common
/// paths are probed concurrently, at most `path_limit` at a time, and the first
/// to validate is returned. Outstanding probes are dropped at that point.
pub(crate) async fn locate_feed(
    http: &HttpClient,
    page_url: &str,
    path_limit: usize,
    block_private: bool,
) -> Option<String> {
    let page = match http.get(page_url, http.timeout()).await {
        Ok(page) => page,
        Err(e) => {
            tracing::debug!(url = %page_url, error = %e, "Candidate page fetch failed");
            return None;
        }
    };

    if let Some(advertised) = find_feed_link(&page.text(), &page.url) {
        let allowed = !block_private || Url::parse(&advertised).is_ok_and(|u| is_public_url(&u));
        if allowed && validate_feed_url(http, &advertised).await {
            return Some(advertised);
        }
        tracing::debug!(url = %advertised, "Advertised feed did not validate, probing common paths");
    }

    let site = Url::parse(&page.url).ok().and_then(|u| origin(&u))?;
    probe_common_paths(http, &site, path_limit).await
}

async fn probe_common_paths(http: &HttpClient, site: &str, limit: usize) -> Option<String> {
    let semaphore = Semaphore::new(limit.max(1));
    let semaphore = &semaphore;

    let mut probes: FuturesUnordered<_> = COMMON_FEED_PATHS
        .iter()
        .map(|path| {
            let url = resolve_url(path, site);
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                validate_feed_url(http, &url).await.then_some(url)
            }
        })
        .collect();

    while let Some(result) = probes.next().await {
        if let Some(url) = result {
            return Some(url);
        }
    }
    None
}

/// Favicon URL from a service template such as
/// `https://www.google.com/s2/favicons?domain={host}&sz=64`.
pub fn favicon_url(template: &str, host: &str) -> String {
    template.replace("{host}", host)
}
