//! Utility functions shared by the feed parser and the discovery pipeline.
//!
//! - **URL validation**: SSRF guard applied to discovered candidate links
//! - **URL helpers**: relative resolution, origins and authority comparison
//! - **Text cleanup**: control-character stripping and whitespace collapsing
//!
//! # Examples
//!
//! ```
//! use feedscout::util::{collapse_whitespace, resolve_url, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(resolve_url("/rss.xml", "https://example.com/blog/"), "https://example.com/rss.xml");
//! assert_eq!(collapse_whitespace("  Hello \n  world "), "Hello world");
//! ```

mod text;
mod url_validator;
mod urls;

pub use text::{collapse_whitespace, strip_control_chars};
pub use url_validator::{is_public_url, validate_url, UrlValidationError};
pub use urls::{authority, origin, resolve_url, short_hash};
