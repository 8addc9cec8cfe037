//! Friend-link blog discovery.
//!
//! Starting from a feed the user already follows, the pipeline finds the
//! author's "friends" page, collects outbound links to other sites, and keeps
//! those that publish a working feed:
//!
//! 1. resolve the seed feed's homepage
//! 2. locate a friend-links page (falls back to the homepage)
//! 3. extract external candidate links, minus the non-blog skip-list
//! 4. validate candidates on a bounded worker pool
//! 5. collect, deduplicate by feed URL
//!
//! Per-candidate failures are logged and dropped; only seed resolution, the
//! homepage fetch, or cancellation before the first stage abort a call.

mod keywords;
mod links;
mod pool;
mod probe;
mod progress;
mod service;

use crate::feed::ParseError;
use crate::http::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub use keywords::{is_skipped_host, matches_friend_keyword, KeywordTable, FRIEND_LINK_KEYWORDS};
pub use links::{extract_external_links, find_feed_link, find_friend_link};
pub use pool::run_bounded;
pub use probe::{favicon_url, looks_like_feed, COMMON_FEED_PATHS};
pub use progress::{Progress, ProgressCallback, Stage};
pub use service::DiscoveryService;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid feed URL: {0}")]
    InvalidFeedUrl(String),
    /// The seed feed could not be fetched or parsed
    #[error("could not resolve homepage from seed feed: {0}")]
    Homepage(#[source] ParseError),
    #[error("could not fetch homepage: {0}")]
    HomepageFetch(#[source] FetchError),
    #[error("discovery cancelled")]
    Cancelled,
}

/// A candidate blog carrying a validated feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredBlog {
    pub name: String,
    pub homepage: String,
    pub rss_feed: String,
    pub icon_url: String,
    pub recent_articles: Vec<RecentArticle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentArticle {
    pub title: String,
    /// `YYYY-MM-DD`, empty when the item is undated
    pub date: String,
}

/// Drops blogs whose feed URL is already in `subscribed`.
pub fn exclude_subscribed(
    blogs: Vec<DiscoveredBlog>,
    subscribed: &HashSet<String>,
) -> Vec<DiscoveredBlog> {
    blogs
        .into_iter()
        .filter(|blog| !subscribed.contains(&blog.rss_feed))
        .collect()
}

/// Keeps the first blog seen for each feed URL.
pub(crate) fn dedup_by_feed(blogs: Vec<DiscoveredBlog>) -> Vec<DiscoveredBlog> {
    let mut seen = HashSet::new();
    blogs
        .into_iter()
        .filter(|blog| seen.insert(blog.rss_feed.clone()))
        .collect()
}
