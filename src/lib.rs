//! Feed acquisition and friend-link blog discovery.
//!
//! - [`feed`]: parse a feed by URL, by external script, or by XPath over HTML/XML
//! - [`discovery`]: find sibling blogs through a site's friend-links page
//! - [`http`]: the shared client both of them fetch through

pub mod config;
pub mod discovery;
pub mod document;
pub mod feed;
pub mod http;
pub mod util;
