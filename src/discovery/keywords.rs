//! Keyword and host tables for friend-link discovery.
//!
//! Pure string matching, kept apart from any network I/O.

/// Phrases that mark a "friend links" anchor, by link text and by URL path.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTable {
    /// Lowercase substrings matched against the anchor text.
    pub text: &'static [&'static str],
    /// Path segments matched exactly against the anchor's href.
    pub path_segments: &'static [&'static str],
}

/// English and Chinese phrasings plus common path names.
pub const FRIEND_LINK_KEYWORDS: KeywordTable = KeywordTable {
    text: &[
        "friend links",
        "friends",
        "blogroll",
        "links",
        "友链",
        "友情链接",
        "友人帐",
        "朋友们",
        "小伙伴",
        "邻居",
        "链接",
    ],
    path_segments: &[
        "friends",
        "friend",
        "links",
        "link",
        "blogroll",
        "youlian",
        "flinks",
        "friend-links",
    ],
};

/// Hosts that never count as blogs: social networks, code hosts, search engines,
/// and other large platforms.
const SKIPPED_HOSTS: &[&str] = &[
    // Social
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "weibo.com",
    "weibo.cn",
    "zhihu.com",
    "douban.com",
    "t.me",
    "telegram.org",
    "reddit.com",
    "mastodon.social",
    "youtube.com",
    "bilibili.com",
    // Code hosting
    "github.com",
    "gitlab.com",
    "gitee.com",
    "bitbucket.org",
    "stackoverflow.com",
    // Search
    "google.com",
    "bing.com",
    "baidu.com",
    "duckduckgo.com",
    "yandex.com",
    // Reference and infrastructure
    "wikipedia.org",
    "beian.miit.gov.cn",
    "cloudflare.com",
    "creativecommons.org",
];

/// Whether the anchor text or href points at a friend-links page.
pub fn matches_friend_keyword(text: &str, href: &str, table: &KeywordTable) -> bool {
    let text = text.trim().to_lowercase();
    if !text.is_empty() && table.text.iter().any(|kw| text.contains(kw)) {
        return true;
    }

    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();
    // Only the path part of absolute hrefs
    let path = match path.find("://") {
        Some(scheme_end) => match path[scheme_end + 3..].find('/') {
            Some(slash) => path[scheme_end + 3 + slash..].to_string(),
            None => String::new(),
        },
        None => path,
    };

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.trim_end_matches(".html"))
        .any(|segment| table.path_segments.contains(&segment))
}

/// Substring match of the lowercased host against the skip-list.
///
/// A match must start at a label boundary, so `x.com` skips `x.com` and
/// `mobile.x.com` but not `box.com`.
pub fn is_skipped_host(host: &str) -> bool {
    let host = host.to_lowercase();
    SKIPPED_HOSTS.iter().any(|skipped| {
        host.match_indices(skipped)
            .any(|(idx, _)| idx == 0 || host.as_bytes()[idx - 1] == b'.')
    })
}
