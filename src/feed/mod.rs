//! Multi-mode feed acquisition.
//!
//! A [`FeedConfig`] selects exactly one strategy:
//!
//! - **URL**: standard RSS/Atom/JSON Feed fetched and parsed with `feed-rs`
//! - **Script**: an external [`ScriptExecutor`] produces the feed
//! - **XPath**: raw HTML/XML is fetched and items are extracted with XPath rules
//!
//! [`FeedParser`] dispatches between them and owns the priority lock that keeps
//! interactive parses from queueing behind each other's retries.
//!
//! # Example
//!
//! ```ignore
//! use feedscout::feed::{FeedConfig, FeedParser};
//!
//! let parser = FeedParser::new(http);
//! let feed = parser.parse(&FeedConfig::from_url("https://example.com/feed.xml"), true).await?;
//! ```

mod parser;
mod script;
mod service;
mod timestamp;
mod types;
mod xpath;

use crate::document::DocumentError;
use crate::http::FetchError;
use std::time::Duration;
use thiserror::Error;

pub use parser::parse_feed;
pub use script::{CommandScriptExecutor, ScriptExecutor};
pub use service::FeedParser;
pub use timestamp::parse_timestamp;
pub use types::{FeedConfig, FeedKind, ParsedFeed, ParsedItem, Strategy, XPathRules};
pub use xpath::extract_feed;

/// Errors from a single parse call. Every one of them fails that call.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Network failure while fetching the source
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The body is not a valid RSS/Atom/JSON feed
    #[error("Invalid feed: {0}")]
    Feed(String),
    /// The document could not be parsed, or an XPath rule does not compile
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// XPath strategy selected without an item expression
    #[error("XPath feed has no item expression configured")]
    MissingItemXPath,
    /// The item expression matched nothing
    #[error("no items found for the given item expression {0:?}")]
    NoItemsFound(String),
    /// Script strategy selected but no executor is registered
    #[error("no script executor configured")]
    NoScriptExecutor,
    /// The script failed to run or exited unsuccessfully
    #[error("Script failed: {0}")]
    Script(String),
    #[error("Script timed out after {0:?}")]
    ScriptTimeout(Duration),
}
