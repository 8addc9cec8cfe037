//! XPath-driven item extraction from raw HTML/XML documents.
//!
//! Only the item expression is load-bearing: missing or failing field
//! expressions leave the field empty, because a partial article is more useful
//! downstream than a dropped one.

use super::timestamp::parse_timestamp;
use super::types::{FeedKind, ParsedFeed, ParsedItem, XPathRules};
use super::ParseError;
use crate::document::{self, XPathDocument};
use crate::util::{collapse_whitespace, resolve_url, short_hash};
use sxd_xpath::nodeset::Node;
use sxd_xpath::XPath;

/// Compiled per-field expressions; `None` where the rule is absent or blank.
struct CompiledRules {
    item: XPath,
    title: Option<XPath>,
    content: Option<XPath>,
    uri: Option<UriRule>,
    author: Option<XPath>,
    timestamp: Option<XPath>,
    thumbnail: Option<XPath>,
    categories: Option<XPath>,
    uid: Option<XPath>,
}

enum UriRule {
    /// `@href` / `./@href`: the item element is itself the anchor.
    ItemHref,
    Expr(XPath),
}

impl CompiledRules {
    fn compile(rules: &XPathRules) -> Result<Self, ParseError> {
        let item = non_blank(&rules.item).ok_or(ParseError::MissingItemXPath)?;
        let uri = match non_blank(&rules.uri) {
            Some(expr) if is_item_href(expr) => Some(UriRule::ItemHref),
            Some(expr) => Some(UriRule::Expr(document::compile(expr)?)),
            None => None,
        };

        Ok(Self {
            item: document::compile(item)?,
            title: optional(&rules.title)?,
            content: optional(&rules.content)?,
            uri,
            author: optional(&rules.author)?,
            timestamp: optional(&rules.timestamp)?,
            thumbnail: optional(&rules.thumbnail)?,
            categories: optional(&rules.categories)?,
            uid: optional(&rules.uid)?,
        })
    }
}

fn non_blank(expr: &Option<String>) -> Option<&str> {
    expr.as_deref().map(str::trim).filter(|e| !e.is_empty())
}

fn optional(expr: &Option<String>) -> Result<Option<XPath>, ParseError> {
    non_blank(expr)
        .map(document::compile)
        .transpose()
        .map_err(ParseError::from)
}

fn is_item_href(expr: &str) -> bool {
    matches!(expr, "@href" | "./@href" | "attribute::href" | "self::*/@href")
}

/// Builds a [`ParsedFeed`] from a fetched document.
///
/// `feed_url` is the base for relative links and the prefix of synthetic URIs.
/// The document must already be decoded to text; `kind` selects the HTML or
/// XML tree builder.
pub fn extract_feed(
    body: &str,
    kind: FeedKind,
    feed_url: &str,
    rules: &XPathRules,
) -> Result<ParsedFeed, ParseError> {
    let compiled = CompiledRules::compile(rules)?;

    let doc = match kind {
        FeedKind::XmlXpath => XPathDocument::parse_xml(body)?,
        _ => XPathDocument::parse_html(body),
    };

    let item_nodes = document::select_nodes(&compiled.item, doc.root());
    if item_nodes.is_empty() {
        let expr = non_blank(&rules.item).unwrap_or_default();
        return Err(ParseError::NoItemsFound(expr.to_string()));
    }

    let items: Vec<ParsedItem> = item_nodes
        .into_iter()
        .map(|node| extract_item(node, &compiled, feed_url, rules.time_format.as_deref()))
        .collect();

    tracing::debug!(url = %feed_url, items = items.len(), "Extracted items via XPath");

    Ok(ParsedFeed {
        title: document_title(&doc).unwrap_or_else(|| feed_url.to_string()),
        link: feed_url.to_string(),
        description: String::new(),
        items,
    })
}

fn document_title(doc: &XPathDocument) -> Option<String> {
    let title = document::compile("//title").ok()?;
    document::select_string(&title, doc.root())
        .map(|t| collapse_whitespace(&t))
        .filter(|t| !t.is_empty())
}

fn extract_item(
    node: Node<'_>,
    rules: &CompiledRules,
    feed_url: &str,
    time_format: Option<&str>,
) -> ParsedItem {
    let text = |xpath: &Option<XPath>| {
        xpath
            .as_ref()
            .and_then(|x| document::select_string(x, node))
            .map(|s| collapse_whitespace(&s))
            .unwrap_or_default()
    };

    let title = text(&rules.title);
    let content = rules
        .content
        .as_ref()
        .and_then(|x| document::select_string(x, node))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let author = text(&rules.author);

    let link = match extract_uri(node, rules.uri.as_ref()) {
        Some(uri) => resolve_url(&uri, feed_url),
        None => synthetic_uri(feed_url, &title, &content),
    };

    let published_at = rules
        .timestamp
        .as_ref()
        .and_then(|x| document::select_string(x, node))
        .and_then(|raw| parse_timestamp(&raw, time_format));

    let image_url = rules
        .thumbnail
        .as_ref()
        .and_then(|x| document::select_first(x, node))
        .and_then(|found| {
            let raw = if document::element_name(&found).as_deref() == Some("img") {
                document::attribute(&found, "src")
            } else {
                document::attribute_node_value(&found).or_else(|| Some(found.string_value()))
            }?;
            let raw = raw.trim();
            (!raw.is_empty()).then(|| resolve_url(raw, feed_url))
        });

    let mut categories: Vec<String> = Vec::new();
    if let Some(xpath) = &rules.categories {
        for found in document::select_nodes(xpath, node) {
            let category = collapse_whitespace(&found.string_value());
            if !category.is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
    }

    let guid = Some(text(&rules.uid))
        .filter(|uid| !uid.is_empty())
        .or_else(|| Some(link.clone()).filter(|l| !l.is_empty()))
        .unwrap_or_else(|| title.clone());

    ParsedItem {
        title,
        content,
        link,
        author,
        published_at,
        image_url,
        categories,
        guid,
    }
}

/// Raw (unresolved) URI for an item, or `None` when nothing usable was found.
fn extract_uri(node: Node<'_>, rule: Option<&UriRule>) -> Option<String> {
    let raw = match rule? {
        UriRule::ItemHref => document::attribute(&node, "href"),
        UriRule::Expr(xpath) => document::select_first(xpath, node).map(|found| {
            document::attribute(&found, "href")
                .or_else(|| document::attribute_node_value(&found))
                .unwrap_or_else(|| found.string_value())
        }),
    }?;
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// `{feed_url}#{hash}` keyed on the title, else the content, else the clock.
///
/// Stable across refreshes whenever the item has a title or content, so
/// downstream deduplication never sees an empty or shifting key.
fn synthetic_uri(feed_url: &str, title: &str, content: &str) -> String {
    let seed = if !title.is_empty() {
        title.to_string()
    } else if !content.is_empty() {
        content.to_string()
    } else {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        nanos.to_string()
    };
    let base = feed_url.split('#').next().unwrap_or(feed_url);
    format!("{}#{}", base, short_hash(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    const FEED_URL: &str = "https://news.example.com/list/";

    const LIST_HTML: &str = r#"<html><head><title>  Example
        News </title></head><body>
  <ul>
    <li class="entry">
      <a class="link" href="/articles/1">Rust 2.0 released</a>
      <span class="by">Ferris</span>
      <time>calendar_month 2025-12</time>
      <img class="cover" src="img/1.png"/>
      <span class="tag">rust</span><span class="tag">release</span><span class="tag">rust</span>
      <p class="body">Big news.</p>
    </li>
    <li class="entry">
      <span class="headline">No link here</span>
      <time>not a date</time>
    </li>
  </ul>
  <nav><a class="item" href="https://other.example.org/x">X</a><a class="item" href="y.html">Y</a></nav>
</body></html>"#;

    fn rules() -> XPathRules {
        XPathRules {
            item: Some("//li[@class='entry']".into()),
            title: Some(".//a[@class='link'] | .//span[@class='headline']".into()),
            content: Some(".//p[@class='body']".into()),
            uri: Some(".//a[@class='link']".into()),
            author: Some(".//span[@class='by']".into()),
            timestamp: Some(".//time".into()),
            thumbnail: Some(".//img".into()),
            categories: Some(".//span[@class='tag']".into()),
            ..XPathRules::default()
        }
    }

    #[test]
    fn test_extracts_all_fields() {
        let feed = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules()).unwrap();
        assert_eq!(feed.title, "Example News");
        assert_eq!(feed.link, FEED_URL);
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "Rust 2.0 released");
        assert_eq!(first.link, "https://news.example.com/articles/1");
        assert_eq!(first.guid, first.link);
        assert_eq!(first.author, "Ferris");
        assert_eq!(first.content, "Big news.");
        assert_eq!(first.image_url.as_deref(), Some("https://news.example.com/list/img/1.png"));
        assert_eq!(first.categories, vec!["rust".to_string(), "release".to_string()]);
        let published = first.published_at.unwrap();
        assert_eq!((published.year(), published.month()), (2025, 12));
    }

    #[test]
    fn test_missing_fields_are_soft() {
        let feed = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules()).unwrap();

        let second = &feed.items[1];
        assert_eq!(second.title, "No link here");
        assert!(second.published_at.is_none());
        assert!(second.image_url.is_none());
        assert!(second.categories.is_empty());
        assert_eq!(second.author, "");
    }

    #[test]
    fn test_link_and_guid_never_empty() {
        let feed = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules()).unwrap();
        for item in &feed.items {
            assert!(!item.link.is_empty());
            assert!(!item.guid.is_empty());
        }

        let second = &feed.items[1];
        assert_eq!(second.link, synthetic_uri(FEED_URL, "No link here", ""));
        assert!(second.link.starts_with("https://news.example.com/list/#"));
        assert_eq!(second.guid, second.link);
    }

    #[test]
    fn test_item_href_rule_reads_anchor_itself() {
        let rules = XPathRules {
            item: Some("//nav/a[@class='item']".into()),
            title: Some(".".into()),
            uri: Some("@href".into()),
            ..XPathRules::default()
        };
        let feed = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules).unwrap();
        let links: Vec<&str> = feed.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://other.example.org/x", "https://news.example.com/list/y.html"]
        );
        assert_eq!(feed.items[0].title, "X");
    }

    #[test]
    fn test_uri_text_fallback_and_explicit_uid() {
        let xml = r#"<?xml version="1.0"?>
<catalog>
  <book id="b1"><name>Dune</name><url>/books/dune</url><cover>covers/dune.jpg</cover></book>
  <book id="b2"><name>Emma</name></book>
</catalog>"#;
        let rules = XPathRules {
            item: Some("/catalog/book".into()),
            title: Some("name".into()),
            uri: Some("url".into()),
            thumbnail: Some("cover".into()),
            uid: Some("@id".into()),
            ..XPathRules::default()
        };
        let feed = extract_feed(xml, FeedKind::XmlXpath, "https://lib.example.com/feed.xml", &rules).unwrap();
        assert_eq!(feed.title, "https://lib.example.com/feed.xml");
        assert_eq!(feed.items[0].link, "https://lib.example.com/books/dune");
        assert_eq!(
            feed.items[0].image_url.as_deref(),
            Some("https://lib.example.com/covers/dune.jpg")
        );
        assert_eq!(feed.items[0].guid, "b1");
        assert_eq!(feed.items[1].guid, "b2");
        assert!(feed.items[1].link.starts_with("https://lib.example.com/feed.xml#"));
    }

    #[test]
    fn test_item_without_title_or_content_gets_clock_uri() {
        let item = extract_item_from("<div><b>t</b></div>", "//div", "");
        assert!(item.link.starts_with('#'));
        assert_eq!(item.guid, item.link);
    }

    fn extract_item_from(html: &str, item: &str, feed_url: &str) -> ParsedItem {
        let rules = XPathRules {
            item: Some(item.into()),
            ..XPathRules::default()
        };
        extract_feed(html, FeedKind::HtmlXpath, feed_url, &rules)
            .unwrap()
            .items
            .remove(0)
    }

    #[test]
    fn test_missing_item_expression_is_config_error() {
        let rules = XPathRules {
            item: Some("  ".into()),
            ..XPathRules::default()
        };
        assert!(matches!(
            extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules),
            Err(ParseError::MissingItemXPath)
        ));
    }

    #[test]
    fn test_zero_items_is_error() {
        let rules = XPathRules {
            item: Some("//article".into()),
            ..XPathRules::default()
        };
        let err = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules).unwrap_err();
        assert!(matches!(err, ParseError::NoItemsFound(ref e) if e == "//article"));
        assert!(err.to_string().contains("no items found"));
    }

    #[test]
    fn test_invalid_field_expression_is_error() {
        let mut rules = rules();
        rules.author = Some("span[".into());
        assert!(matches!(
            extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules),
            Err(ParseError::Document(_))
        ));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let rules = XPathRules {
            item: Some("//item".into()),
            ..XPathRules::default()
        };
        assert!(matches!(
            extract_feed("<rss><item></rss>", FeedKind::XmlXpath, FEED_URL, &rules),
            Err(ParseError::Document(_))
        ));
    }

    #[test]
    fn test_xml_mixed_content_keeps_word_spacing() {
        let xml = r#"<feed><entry><title>Spaced <em>out</em> title</title>
<summary>Hello <b>big</b> world</summary></entry></feed>"#;
        let rules = XPathRules {
            item: Some("//entry".into()),
            title: Some("title".into()),
            content: Some("summary".into()),
            ..XPathRules::default()
        };
        let feed = extract_feed(xml, FeedKind::XmlXpath, FEED_URL, &rules).unwrap();
        assert_eq!(feed.items[0].title, "Spaced out title");
        assert_eq!(feed.items[0].content, "Hello big world");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let a = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules()).unwrap();
        let b = extract_feed(LIST_HTML, FeedKind::HtmlXpath, FEED_URL, &rules()).unwrap();
        assert_eq!(a.items, b.items);
    }
}
