//! HTTP access layer shared by the feed parser and the discovery pipeline.
//!
//! One [`HttpClient`] wraps a single `reqwest::Client` (cheap to clone, safe to
//! share across tasks). Every call carries its own deadline through
//! `tokio::time::timeout`; redirects are capped at [`MAX_REDIRECTS`] hops and
//! response bodies are read through a size limit.

use crate::config::HttpSettings;
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;
use std::time::Duration;
use thiserror::Error;

/// Redirect hops followed before a request fails.
pub const MAX_REDIRECTS: usize = 5;

/// Leading bytes searched for an in-document charset declaration.
const CHARSET_SNIFF_BYTES: usize = 1024;

const ACCEPT_FEEDS_AND_PAGES: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/html;q=0.8, */*;q=0.5";

/// Errors that can occur while talking to a remote host.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded its deadline
    #[error("Request timed out")]
    Timeout,
    /// More than [`MAX_REDIRECTS`] redirects
    #[error("Too many redirects (max {MAX_REDIRECTS})")]
    TooManyRedirects,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// The URL could not be used as a request target
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The client itself could not be constructed (bad proxy URL, TLS backend)
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_redirect() {
            FetchError::TooManyRedirects
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else {
            FetchError::Network(e)
        }
    }
}

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects; relative links in the body resolve against it.
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Body decoded to text, replacing invalid sequences.
    ///
    /// The encoding comes from a byte-order mark, else the `charset` of the
    /// Content-Type header, else a `<meta charset>` or `<?xml encoding?>`
    /// declaration near the top of the body, else UTF-8.
    pub fn text(&self) -> String {
        let encoding = self
            .content_type
            .as_deref()
            .and_then(charset_param)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .or_else(|| sniff_charset(&self.body))
            .unwrap_or(UTF_8);
        let (text, used, had_errors) = encoding.decode(&self.body);
        if had_errors {
            tracing::debug!(url = %self.url, encoding = used.name(), "Body had undecodable bytes");
        }
        text.into_owned()
    }
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

/// Earliest `charset=` or `encoding=` declaration in the head of the body.
///
/// A document cannot declare itself UTF-16 from inside ASCII text, so such
/// labels fall back to UTF-8.
fn sniff_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(CHARSET_SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let (at, key) = ["charset=", "encoding="]
        .into_iter()
        .filter_map(|key| head.find(key).map(|at| (at, key)))
        .min()?;
    let label: String = head[at + key.len()..]
        .trim_start_matches(|c| c == '"' || c == '\'' || c == ' ')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        .collect();

    let encoding = Encoding::for_label(label.as_bytes())?;
    Some(if encoding.is_ascii_compatible() {
        encoding
    } else {
        UTF_8
    })
}

/// Status, content type and the first bytes of a response, used to validate feeds.
#[derive(Debug, Clone)]
pub struct Probe {
    pub status: u16,
    pub content_type: Option<String>,
    /// Leading body bytes (empty for HEAD requests).
    pub prefix: Vec<u8>,
}

/// Shared HTTP client.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    priority_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    max_body_bytes: usize,
}

impl HttpClient {
    /// Builds the client from externally supplied settings (proxy, timeouts, UA).
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEEDS_AND_PAGES));

        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(settings.timeout());

        if let Some(proxy) = &settings.proxy {
            let mut configured = reqwest::Proxy::all(proxy.url.as_str())
                .map_err(|e| FetchError::Client(format!("invalid proxy URL: {e}")))?;
            if let Some(username) = &proxy.username {
                let password = proxy
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret())
                    .unwrap_or("");
                configured = configured.basic_auth(username, password);
            }
            tracing::info!(proxy = %proxy.url, "Routing requests through proxy");
            builder = builder.proxy(configured);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: settings.timeout(),
            priority_timeout: settings.priority_timeout(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff(),
            max_body_bytes: settings.max_body_bytes,
        })
    }

    /// Deadline for background requests.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for interactive requests.
    pub fn priority_timeout(&self) -> Duration {
        self.priority_timeout
    }

    /// Single GET attempt with a deadline and body limit. Non-2xx is an error.
    pub async fn get(&self, url: &str, deadline: Duration) -> Result<Fetched, FetchError> {
        let response = self.send(self.client.get(url), deadline).await?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }
        let final_url = response.url().to_string();
        let content_type = content_type_of(&response);
        let body = tokio::time::timeout(deadline, read_limited_bytes(response, self.max_body_bytes))
            .await
            .map_err(|_| FetchError::Timeout)??;

        Ok(Fetched {
            url: final_url,
            content_type,
            body,
        })
    }

    /// GET with exponential backoff on 429, 5xx and truncated bodies.
    ///
    /// Used for background feed refreshes; interactive callers use [`HttpClient::get`]
    /// so a flaky server never stretches a click into a multi-second wait.
    pub async fn get_with_retry(&self, url: &str, deadline: Duration) -> Result<Fetched, FetchError> {
        let mut retry_count = 0;

        loop {
            let error = match self.get(url, deadline).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => e,
            };

            let retryable = match &error {
                FetchError::HttpStatus(429) => {
                    if retry_count >= self.max_retries {
                        return Err(FetchError::RateLimited(self.max_retries));
                    }
                    true
                }
                FetchError::HttpStatus(status) => *status >= 500,
                FetchError::IncompleteResponse { .. } => true,
                _ => false,
            };

            if !retryable || retry_count >= self.max_retries {
                return Err(error);
            }

            let delay = self.retry_backoff.saturating_mul(2u32.saturating_pow(retry_count));
            tracing::warn!(
                url = %url,
                error = %error,
                retry = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                "Transient fetch failure, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }

    /// HEAD request; the status is reported, not turned into an error.
    pub async fn head(&self, url: &str) -> Result<Probe, FetchError> {
        let response = self.send(self.client.head(url), self.timeout).await?;
        Ok(Probe {
            status: response.status().as_u16(),
            content_type: content_type_of(&response),
            prefix: Vec::new(),
        })
    }

    /// GET that only reads the first `limit` bytes of the body.
    pub async fn get_prefix(&self, url: &str, limit: usize) -> Result<Probe, FetchError> {
        let response = self.send(self.client.get(url), self.timeout).await?;
        let status = response.status().as_u16();
        let content_type = content_type_of(&response);

        let mut prefix = Vec::with_capacity(limit);
        let mut stream = response.bytes_stream();
        let read = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                prefix.extend_from_slice(&chunk);
                if prefix.len() >= limit {
                    break;
                }
            }
            Ok::<_, FetchError>(())
        };
        tokio::time::timeout(self.timeout, read)
            .await
            .map_err(|_| FetchError::Timeout)??;
        prefix.truncate(limit);

        Ok(Probe {
            status,
            content_type,
            prefix,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        deadline: Duration,
    ) -> Result<reqwest::Response, FetchError> {
        tokio::time::timeout(deadline, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::from)
    }
}

fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: fewer bytes than Content-Length means the connection dropped mid-body
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
