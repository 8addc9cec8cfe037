use sha2::{Digest, Sha256};
use url::Url;

/// Resolves a potentially relative URL against a base URL.
///
/// Absolute URLs are returned unchanged, protocol-relative URLs inherit the base
/// scheme, and anything that fails to resolve is returned as-is (trimmed).
pub fn resolve_url(href: &str, base_url: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // SEC-014: Protocol-relative: go through the URL parser so credentials and
    // dot segments are normalized rather than pasted verbatim.
    if let Ok(base) = Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    } else if let Some(rest) = href.strip_prefix("//") {
        if let Ok(parsed) = Url::parse(&format!("https://{rest}")) {
            return parsed.to_string();
        }
    }

    href.to_owned()
}

/// Returns `scheme://host[:port]/` for a URL, the fallback homepage of a feed.
pub fn origin(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}

/// Lowercased `host[:port]`, used to tell internal links from external ones.
///
/// The port only appears when it differs from the scheme default, so
/// `https://a.com` and `https://a.com:443` compare equal.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// First 16 hex characters of the SHA-256 digest of `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(16);
    hex
}
