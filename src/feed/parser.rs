use super::types::{ParsedFeed, ParsedItem};
use crate::util::{collapse_whitespace, strip_control_chars};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// Parses RSS, Atom or JSON Feed bytes into a [`ParsedFeed`].
///
/// `feed_url` is only used to tell the feed's self link apart from its homepage.
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    // SEC-016: feed metadata is attacker-controlled; strip control characters
    let title = feed
        .title
        .map(|t| collapse_whitespace(&t.content))
        .unwrap_or_default();
    let description = feed
        .description
        .map(|d| strip_control_chars(d.content.trim()).into_owned())
        .unwrap_or_default();

    // Homepage: an alternate link that is not the feed itself
    let link = feed
        .links
        .iter()
        .find(|l| l.href != feed_url && l.rel.as_deref() != Some("self"))
        .map(|l| strip_control_chars(&l.href).into_owned())
        .unwrap_or_default();

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published_at = entry.published.or(entry.updated);
            let content = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| collapse_whitespace(&t.content))
                .unwrap_or_default();
            let author = entry
                .authors
                .first()
                .map(|p| collapse_whitespace(&p.name))
                .unwrap_or_default();
            let image_url = entry
                .media
                .iter()
                .flat_map(|m| m.thumbnails.iter())
                .map(|t| t.image.uri.clone())
                .next();

            let mut categories: Vec<String> = Vec::new();
            for category in &entry.categories {
                let term = collapse_whitespace(category.label.as_deref().unwrap_or(&category.term));
                if !term.is_empty() && !categories.contains(&term) {
                    categories.push(term);
                }
            }

            let existing_id = Some(entry.id.as_str()).filter(|id| !id.trim().is_empty());
            let guid = generate_guid(
                existing_id,
                Some(link.as_str()).filter(|l| !l.is_empty()),
                &title,
                published_at.map(|dt| dt.timestamp()),
            );

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
        })
        .collect();

    Ok(ParsedFeed {
        title,
        link,
        description,
        items,
    })
}

fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
