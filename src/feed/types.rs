use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a feed's source document is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedKind {
    /// RSS/Atom/JSON feed fetched from `url`.
    #[default]
    Regular,
    /// HTML page turned into items by XPath rules.
    HtmlXpath,
    /// Arbitrary XML document turned into items by XPath rules.
    XmlXpath,
    /// Mailbox-backed feed; acquired by the URL strategy here.
    Email,
    Other,
}

/// XPath expressions used by the XPath strategy. Only `item` is required.
///
/// Every other expression is evaluated relative to each item node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XPathRules {
    pub item: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub uri: Option<String>,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    /// chrono `strftime` pattern for `timestamp`, e.g. `%d.%m.%Y`.
    pub time_format: Option<String>,
    pub thumbnail: Option<String>,
    pub categories: Option<String>,
    pub uid: Option<String>,
}

/// Describes how to acquire one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default, alias = "type")]
    pub kind: FeedKind,
    #[serde(default)]
    pub script_path: Option<String>,
    #[serde(default)]
    pub xpath: XPathRules,
}

/// The acquisition strategy selected for a [`FeedConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy<'a> {
    Url,
    Script(&'a str),
    XPath,
}

impl FeedConfig {
    /// A plain RSS/Atom subscription.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Picks exactly one strategy: script beats XPath beats URL.
    pub fn strategy(&self) -> Strategy<'_> {
        if let Some(script) = self.script_path.as_deref().filter(|s| !s.trim().is_empty()) {
            return Strategy::Script(script);
        }
        match self.kind {
            FeedKind::HtmlXpath | FeedKind::XmlXpath => Strategy::XPath,
            _ => Strategy::Url,
        }
    }
}

/// Normalized result of one parse call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<ParsedItem>,
}

/// One article. `link` and `guid` are never empty for XPath-extracted items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedItem {
    pub title: String,
    pub content: String,
    pub link: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub categories: Vec<String>,
    pub guid: String,
}
