use super::links::{extract_external_links, find_friend_link};
use super::pool::run_bounded;
use super::probe::{favicon_url, locate_feed};
use super::progress::{ProgressCallback, ProgressReporter, Stage};
use super::{dedup_by_feed, exclude_subscribed, DiscoveredBlog, DiscoveryError, RecentArticle};
use crate::config::DiscoverySettings;
use crate::feed::{FeedConfig, FeedParser, ParsedItem};
use crate::http::HttpClient;
use crate::util::{authority, is_public_url, origin, validate_url};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const RECENT_ARTICLE_LIMIT: usize = 3;

/// Friend-link discovery over a shared HTTP client and feed parser.
///
/// Cheap to clone; each worker holds its own handle.
#[derive(Clone)]
pub struct DiscoveryService {
    http: HttpClient,
    parser: Arc<FeedParser>,
    settings: DiscoverySettings,
}

impl DiscoveryService {
    pub fn new(parser: Arc<FeedParser>, settings: DiscoverySettings) -> Self {
        Self {
            http: parser.http().clone(),
            parser,
            settings,
        }
    }

    /// Discovers sibling blogs starting from the feed at `feed_url`.
    ///
    /// Cancelling `cancel` before candidate validation begins aborts any fetch in
    /// flight with [`DiscoveryError::Cancelled`]. Once validation has started it
    /// stops new candidate checks from starting, and whatever finished by then
    /// is returned.
    pub async fn discover_from_feed(
        &self,
        feed_url: &str,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<DiscoveredBlog>, DiscoveryError> {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        let seed = self.check_seed(feed_url)?;
        let reporter = Arc::new(ProgressReporter::new(progress));

        // 1. Homepage
        reporter.stage(Stage::FetchingHomepage, "Resolving homepage", feed_url);
        let homepage = until_cancelled(cancel, self.resolve_homepage(&seed)).await??;
        tracing::info!(feed = %feed_url, homepage = %homepage, "Starting discovery");

        // 2. Friend-links page
        reporter.stage(Stage::FindingFriendLinks, "Looking for a friend links page", homepage.as_str());
        let home = until_cancelled(cancel, self.http.get(&homepage, self.http.timeout()))
            .await?
            .map_err(DiscoveryError::HomepageFetch)?;
        let home_html = home.text();

        // 3. Candidate links
        let friend_page = choose_friend_page(
            find_friend_link(&home_html, &home.url),
            &home.url,
            &homepage,
            self.settings.block_private_networks,
        );
        let (page_html, page_url) = match friend_page {
            Some(friend_url) => {
                reporter.stage(Stage::FetchingFriendPage, "Fetching friend links page", friend_url.as_str());
                match until_cancelled(cancel, self.http.get(&friend_url, self.http.timeout())).await? {
                    Ok(page) => (page.text(), page.url),
                    Err(e) => {
                        tracing::debug!(url = %friend_url, error = %e, "Friend page fetch failed, using homepage");
                        (home_html, home.url.clone())
                    }
                }
            }
            None => {
                tracing::debug!(homepage = %homepage, "No friend links page, scanning homepage");
                (home_html, home.url.clone())
            }
        };

        let home_authority = Url::parse(&home.url)
            .ok()
            .and_then(|u| authority(&u))
            .unwrap_or_default();
        let candidates = extract_external_links(
            &page_html,
            &page_url,
            &home_authority,
            self.settings.block_private_networks,
        );
        reporter.set_total(candidates.len());
        reporter.stage(
            Stage::FoundLinks,
            format!("Found {} candidate links", candidates.len()),
            page_url.as_str(),
        );

        // 4. Validate
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }
        let found = run_bounded(
            candidates,
            self.settings.max_concurrent_rss_checks,
            cancel,
            |candidate| {
                let service = self.clone();
                let reporter = reporter.clone();
                async move {
                    reporter.checking(&candidate);
                    let blog = service.check_candidate(&candidate).await;
                    reporter.finished(&candidate, blog.as_ref().map(|b| b.name.as_str()));
                    blog
                }
            },
        )
        .await;

        // 5. Assemble
        let blogs = dedup_by_feed(found);
        if cancel.is_cancelled() {
            tracing::info!(found = blogs.len(), "Discovery cancelled, returning partial results");
        }
        reporter.stage(
            Stage::Complete,
            format!("Discovered {} blogs", blogs.len()),
            format!("{} candidates carried a feed", reporter.found_count()),
        );
        Ok(blogs)
    }

    /// Runs discovery for each seed in turn and merges the results.
    ///
    /// Seeds that fail are logged and skipped. Blogs already in `subscribed`, and
    /// the seeds themselves, are left out.
    pub async fn discover_many(
        &self,
        feed_urls: &[String],
        subscribed: &HashSet<String>,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Vec<DiscoveredBlog> {
        let mut all = Vec::new();
        for feed_url in feed_urls {
            if cancel.is_cancelled() {
                break;
            }
            match self.discover_from_feed(feed_url, cancel, progress.clone()).await {
                Ok(blogs) => all.extend(blogs),
                Err(DiscoveryError::Cancelled) => break,
                Err(e) => tracing::warn!(feed = %feed_url, error = %e, "Discovery failed for seed"),
            }
        }

        let mut known = subscribed.clone();
        known.extend(feed_urls.iter().cloned());
        exclude_subscribed(dedup_by_feed(all), &known)
    }

    fn check_seed(&self, feed_url: &str) -> Result<Url, DiscoveryError> {
        let url = if self.settings.block_private_networks {
            validate_url(feed_url).map_err(|e| DiscoveryError::InvalidFeedUrl(e.to_string()))?
        } else {
            Url::parse(feed_url).map_err(|e| DiscoveryError::InvalidFeedUrl(e.to_string()))?
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(DiscoveryError::InvalidFeedUrl(feed_url.to_string()));
        }
        Ok(url)
    }

    /// The seed feed's declared homepage, else its origin.
    async fn resolve_homepage(&self, seed: &Url) -> Result<String, DiscoveryError> {
        let feed = self
            .parser
            .parse(&FeedConfig::from_url(seed.as_str()), false)
            .await
            .map_err(DiscoveryError::Homepage)?;

        choose_homepage(&feed.link, seed, self.settings.block_private_networks)
            .ok_or_else(|| DiscoveryError::InvalidFeedUrl(seed.to_string()))
    }

    /// Locates, validates and summarizes one candidate. `None` excludes it.
    async fn check_candidate(&self, candidate: &str) -> Option<DiscoveredBlog> {
        let host = Url::parse(candidate).ok()?.host_str()?.to_string();
        let rss_feed = locate_feed(
            &self.http,
            candidate,
            self.settings.max_concurrent_path_checks,
            self.settings.block_private_networks,
        )
        .await?;

        let feed = match self.parser.parse(&FeedConfig::from_url(rss_feed.as_str()), false).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::debug!(candidate = %candidate, feed = %rss_feed, error = %e, "Validated feed failed to parse");
                return None;
            }
        };

        let name = match feed.title.trim() {
            "" => host.clone(),
            title => title.to_string(),
        };
        tracing::debug!(candidate = %candidate, feed = %rss_feed, "Discovered blog");

        Some(DiscoveredBlog {
            name,
            homepage: candidate.to_string(),
            rss_feed,
            icon_url: favicon_url(&self.settings.favicon_service, &host),
            recent_articles: recent_articles(&feed.items, RECENT_ARTICLE_LIMIT),
        })
    }
}

/// Runs `fut` to completion unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, DiscoveryError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DiscoveryError::Cancelled),
        out = fut => Ok(out),
    }
}

fn fetchable(url: &str, block_private: bool) -> bool {
    Url::parse(url).is_ok_and(|u| {
        matches!(u.scheme(), "http" | "https") && (!block_private || is_public_url(&u))
    })
}

/// The feed's declared homepage when it may be fetched, else the seed's origin.
///
/// The declared link comes from a remote document, so it passes the same
/// private-network guard as the seed.
fn choose_homepage(declared: &str, seed: &Url, block_private: bool) -> Option<String> {
    let declared = declared.trim();
    if fetchable(declared, block_private) {
        return Some(declared.to_string());
    }
    if !declared.is_empty() {
        tracing::debug!(declared = %declared, seed = %seed, "Ignoring declared homepage");
    }
    origin(seed)
}

/// The friend-links page to fetch, or `None` to scan the homepage itself.
fn choose_friend_page(
    found: Option<String>,
    home_url: &str,
    homepage: &str,
    block_private: bool,
) -> Option<String> {
    let url = found.filter(|url| url != home_url && url != homepage)?;
    if fetchable(&url, block_private) {
        Some(url)
    } else {
        tracing::warn!(url = %url, "Friend links page blocked by private-network guard");
        None
    }
}

/// Newest `limit` items, undated ones last, with `YYYY-MM-DD` dates.
fn recent_articles(items: &[ParsedItem], limit: usize) -> Vec<RecentArticle> {
    let mut sorted: Vec<&ParsedItem> = items.iter().collect();
    // None < Some, so descending order puts undated items last
    sorted.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    sorted
        .into_iter()
        .take(limit)
        .map(|item| RecentArticle {
            title: item.title.clone(),
            date: item
                .published_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        })
        .collect()
}
