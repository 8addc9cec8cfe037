//! Integration tests for XPath-driven feeds, served over HTTP by wiremock.
//!
//! Each test runs its own mock server and goes through the public
//! `FeedParser` entry point, so fetching, tree building and extraction are
//! exercised together.

use chrono::{Datelike, TimeZone, Utc};
use feedscout::config::HttpSettings;
use feedscout::feed::{FeedConfig, FeedKind, FeedParser, ParseError, XPathRules};
use feedscout::http::HttpClient;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NEWS_HTML: &str = r#"<!DOCTYPE html>
<html><head><title>  Village
  News </title></head>
<body>
  <ul id="news">
    <li class="story">
      <a class="headline" href="/stories/harvest">Harvest festival</a>
      <span class="meta"><i class="icon-clock"></i> Posted 2024-09-14 18:30</span>
      <img src="/img/harvest.jpg">
      <span class="tag">events</span><span class="tag">autumn</span><span class="tag">events</span>
      <p class="body">Stalls open at noon.</p>
    </li>
    <li class="story">
      <a class="headline" href="https://elsewhere.example/bridge">Bridge repairs</a>
      <span class="meta">14.09.2024</span>
      <p class="body">Detour via Mill Lane.</p>
    </li>
    <li class="story">
      <span class="headline">Lost cat</span>
      <p class="body">Answers to Biscuit.</p>
    </li>
  </ul>
</body></html>"#;

const CATALOG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:example:catalog">
  <release id="r-100">
    <name>Spring Sampler</name>
    <url>/releases/100</url>
    <date>Mar 3, 2024</date>
  </release>
  <release id="r-101">
    <name>Summer Sessions</name>
    <url>/releases/101</url>
    <date>2024-07-21</date>
  </release>
</catalog>"#;

fn parser() -> FeedParser {
    let settings = HttpSettings {
        timeout_secs: 5,
        priority_timeout_secs: 2,
        max_retries: 1,
        retry_backoff_ms: 10,
        ..HttpSettings::default()
    };
    FeedParser::new(HttpClient::new(&settings).unwrap())
}

async fn serve(body: &str, content_type: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), content_type))
        .mount(&server)
        .await;
    server
}

fn news_rules() -> XPathRules {
    XPathRules {
        item: Some("//li[@class='story']".into()),
        title: Some(".//*[@class='headline']".into()),
        content: Some(".//p[@class='body']".into()),
        uri: Some(".//a[@class='headline']".into()),
        timestamp: Some(".//span[@class='meta']".into()),
        thumbnail: Some(".//img".into()),
        categories: Some(".//span[@class='tag']".into()),
        ..XPathRules::default()
    }
}

fn html_config(server: &MockServer, rules: XPathRules) -> FeedConfig {
    FeedConfig {
        url: format!("{}/page", server.uri()),
        kind: FeedKind::HtmlXpath,
        script_path: None,
        xpath: rules,
    }
}

#[tokio::test]
async fn test_html_page_becomes_feed() {
    let server = serve(NEWS_HTML, "text/html; charset=utf-8").await;
    let config = html_config(&server, news_rules());

    let feed = parser().parse(&config, true).await.unwrap();
    assert_eq!(feed.title, "Village News");
    assert_eq!(feed.link, config.url);
    assert_eq!(feed.items.len(), 3);

    let harvest = &feed.items[0];
    assert_eq!(harvest.title, "Harvest festival");
    assert_eq!(harvest.content, "Stalls open at noon.");
    assert_eq!(harvest.link, format!("{}/stories/harvest", server.uri()));
    assert_eq!(harvest.guid, harvest.link);
    assert_eq!(harvest.image_url, Some(format!("{}/img/harvest.jpg", server.uri())));
    assert_eq!(harvest.categories, vec!["events".to_string(), "autumn".to_string()]);
    assert_eq!(
        harvest.published_at,
        Some(Utc.with_ymd_and_hms(2024, 9, 14, 18, 30, 0).unwrap())
    );

    let bridge = &feed.items[1];
    assert_eq!(bridge.link, "https://elsewhere.example/bridge");
    assert_eq!(bridge.image_url, None);
    assert!(bridge.categories.is_empty());
}

#[tokio::test]
async fn test_every_item_gets_link_and_guid() {
    let server = serve(NEWS_HTML, "text/html").await;
    let feed = parser()
        .parse(&html_config(&server, news_rules()), false)
        .await
        .unwrap();

    for item in &feed.items {
        assert!(!item.link.is_empty(), "empty link for {:?}", item.title);
        assert!(!item.guid.is_empty(), "empty guid for {:?}", item.title);
    }

    // No anchor: synthetic URI derived from the title
    let lost_cat = &feed.items[2];
    let prefix = format!("{}/page#", server.uri());
    assert!(lost_cat.link.starts_with(&prefix));
    assert_eq!(lost_cat.link.len(), prefix.len() + 16);
}

#[tokio::test]
async fn test_custom_time_format() {
    let server = serve(NEWS_HTML, "text/html").await;
    let rules = XPathRules {
        time_format: Some("%d.%m.%Y".into()),
        ..news_rules()
    };
    let feed = parser().parse(&html_config(&server, rules), false).await.unwrap();

    let bridge = feed.items[1].published_at.unwrap();
    assert_eq!((bridge.year(), bridge.month(), bridge.day()), (2024, 9, 14));
    // Text that does not fit the custom format stays unset
    assert_eq!(feed.items[0].published_at, None);
}

#[tokio::test]
async fn test_same_document_parses_identically() {
    let server = serve(NEWS_HTML, "text/html").await;
    let config = html_config(&server, news_rules());
    let parser = parser();

    let first = parser.parse(&config, false).await.unwrap();
    let second = parser.parse(&config, false).await.unwrap();
    assert_eq!(first.items, second.items);
}

#[tokio::test]
async fn test_namespaced_xml_catalog() {
    let server = serve(CATALOG_XML, "application/xml").await;
    let config = FeedConfig {
        url: format!("{}/page", server.uri()),
        kind: FeedKind::XmlXpath,
        script_path: None,
        xpath: XPathRules {
            item: Some("//release".into()),
            title: Some("name".into()),
            uri: Some("url".into()),
            timestamp: Some("date".into()),
            uid: Some("@id".into()),
            ..XPathRules::default()
        },
    };

    let feed = parser().parse(&config, false).await.unwrap();
    // No <title> element: the feed URL stands in
    assert_eq!(feed.title, config.url);
    assert_eq!(feed.items.len(), 2);
    assert_eq!(feed.items[0].title, "Spring Sampler");
    assert_eq!(feed.items[0].guid, "r-100");
    assert_eq!(feed.items[0].link, format!("{}/releases/100", server.uri()));
    assert_eq!(
        feed.items[0].published_at.map(|d| d.date_naive().to_string()).as_deref(),
        Some("2024-03-03")
    );
    assert_eq!(
        feed.items[1].published_at.map(|d| d.date_naive().to_string()).as_deref(),
        Some("2024-07-21")
    );
}

#[tokio::test]
async fn test_item_expression_matching_nothing() {
    let server = serve(NEWS_HTML, "text/html").await;
    let rules = XPathRules {
        item: Some("//article".into()),
        ..news_rules()
    };
    let err = parser()
        .parse(&html_config(&server, rules), false)
        .await
        .unwrap_err();
    match err {
        ParseError::NoItemsFound(expr) => assert_eq!(expr, "//article"),
        other => panic!("expected NoItemsFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_item_expression_fails_before_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let rules = XPathRules {
        item: None,
        ..news_rules()
    };
    let err = parser()
        .parse(&html_config(&server, rules), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::MissingItemXPath));
}

#[tokio::test]
async fn test_malformed_xml_is_parse_error() {
    let server = serve("<catalog><release></catalog>", "application/xml").await;
    let config = FeedConfig {
        url: format!("{}/page", server.uri()),
        kind: FeedKind::XmlXpath,
        script_path: None,
        xpath: XPathRules {
            item: Some("//release".into()),
            ..XPathRules::default()
        },
    };
    let err = parser().parse(&config, false).await.unwrap_err();
    assert!(matches!(err, ParseError::Document(_)));
}

#[tokio::test]
async fn test_http_error_surfaces_as_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = parser()
        .parse(&html_config(&server, news_rules()), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::Fetch(_)));
}
