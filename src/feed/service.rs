use super::parser::parse_feed;
use super::script::ScriptExecutor;
use super::types::{FeedConfig, ParsedFeed, Strategy};
use super::xpath::extract_feed;
use super::ParseError;
use crate::http::{FetchError, Fetched, HttpClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces a [`ParsedFeed`] from a [`FeedConfig`].
///
/// Stateless apart from the priority lock; share one instance behind an `Arc`.
pub struct FeedParser {
    http: HttpClient,
    executor: Option<Arc<dyn ScriptExecutor>>,
    script_timeout: Duration,
    /// Serializes priority (interactive) calls. Background calls never take it.
    priority_lock: Mutex<()>,
}

impl FeedParser {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            executor: None,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            priority_lock: Mutex::new(()),
        }
    }

    /// Registers the collaborator used by script-backed feeds.
    pub fn with_script_executor(
        mut self,
        executor: Arc<dyn ScriptExecutor>,
        timeout: Duration,
    ) -> Self {
        self.executor = Some(executor);
        self.script_timeout = timeout;
        self
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Parses one feed.
    ///
    /// `priority` marks an interactive call: it uses the shorter priority timeout,
    /// makes a single attempt, and waits only for other priority calls.
    pub async fn parse(&self, config: &FeedConfig, priority: bool) -> Result<ParsedFeed, ParseError> {
        let _guard = if priority {
            Some(self.priority_lock.lock().await)
        } else {
            None
        };

        match config.strategy() {
            Strategy::Script(script_path) => self.parse_script(script_path).await,
            Strategy::XPath => {
                if config.xpath.item.as_deref().map_or(true, |e| e.trim().is_empty()) {
                    return Err(ParseError::MissingItemXPath);
                }
                let fetched = self.fetch(&config.url, priority).await?;
                let body = fetched.text();
                extract_feed(&body, config.kind, &config.url, &config.xpath)
            }
            Strategy::Url => {
                let fetched = self.fetch(&config.url, priority).await?;
                parse_feed(&fetched.body, &config.url).map_err(|e| {
                    tracing::debug!(url = %config.url, error = %e, "Feed body failed to parse");
                    ParseError::Feed(e.to_string())
                })
            }
        }
    }

    async fn fetch(&self, url: &str, priority: bool) -> Result<Fetched, FetchError> {
        if priority {
            self.http.get(url, self.http.priority_timeout()).await
        } else {
            self.http.get_with_retry(url, self.http.timeout()).await
        }
    }

    async fn parse_script(&self, script_path: &str) -> Result<ParsedFeed, ParseError> {
        let executor = self.executor.as_ref().ok_or(ParseError::NoScriptExecutor)?;
        tokio::time::timeout(self.script_timeout, executor.execute_script(script_path))
            .await
            .map_err(|_| {
                tracing::warn!(script = %script_path, timeout = ?self.script_timeout, "Feed script timed out");
                ParseError::ScriptTimeout(self.script_timeout)
            })?
    }
}
