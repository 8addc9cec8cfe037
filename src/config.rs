//! Configuration file parser for ~/.config/feedscout/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and logged as warnings so typos surface.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every section uses `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpSettings,
    pub discovery: DiscoverySettings,
    pub scripts: ScriptSettings,
}

/// Settings consumed by the HTTP access layer's client constructor.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Timeout for background (batch) requests, in seconds.
    pub timeout_secs: u64,
    /// Timeout for priority (interactive) parse calls, in seconds.
    pub priority_timeout_secs: u64,
    pub user_agent: String,
    /// Retries for background feed fetches on 429/5xx/truncated bodies.
    pub max_retries: u32,
    /// Base delay of the exponential backoff, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Upper bound on any response body read into memory.
    pub max_body_bytes: usize,
    pub proxy: Option<ProxySettings>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            priority_timeout_secs: 10,
            user_agent: concat!("feedscout/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 3,
            retry_backoff_ms: 1000,
            max_body_bytes: 10 * 1024 * 1024,
            proxy: None,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn priority_timeout(&self) -> Duration {
        Duration::from_secs(self.priority_timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Outbound proxy, e.g. `http://proxy.local:3128` or `socks5://127.0.0.1:1080`.
///
/// SEC-015: Custom Debug impl masks the password.
#[derive(Deserialize)]
pub struct ProxySettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

/// Concurrency bounds and enrichment settings for friend-link discovery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Capacity of the outer pool: candidate links checked at once.
    pub max_concurrent_rss_checks: usize,
    /// Capacity of the inner pool: conventional feed paths probed at once per candidate.
    pub max_concurrent_path_checks: usize,
    /// Favicon service template; `{host}` is replaced by the candidate's host.
    pub favicon_service: String,
    /// Drop candidate links pointing at localhost or private networks.
    pub block_private_networks: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_concurrent_rss_checks: 8,
            max_concurrent_path_checks: 3,
            favicon_service: "https://www.google.com/s2/favicons?domain={host}&sz=64".to_string(),
            block_private_networks: true,
        }
    }
}

/// Settings for the command-backed script executor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Directory scripts are resolved against. No directory means no executor.
    pub dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: 30,
        }
    }
}

impl ScriptSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["http", "discovery", "scripts"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            timeout_secs = config.http.timeout_secs,
            proxy = config.http.proxy.is_some(),
            rss_checks = config.discovery.max_concurrent_rss_checks,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.http.priority_timeout_secs, 10);
        assert!(config.http.priority_timeout() < config.http.timeout());
        assert!(config.http.proxy.is_none());
        assert_eq!(config.discovery.max_concurrent_rss_checks, 8);
        assert_eq!(config.discovery.max_concurrent_path_checks, 3);
        assert!(config.discovery.block_private_networks);
        assert!(config.scripts.dir.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedscout_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_empty_and_whitespace_content_returns_default() {
        assert_eq!(Config::from_toml("").unwrap().http.max_retries, 3);
        assert_eq!(Config::from_toml("  \n \n").unwrap().http.max_retries, 3);
    }

    #[test]
    fn test_partial_section_uses_defaults_for_missing() {
        let config = Config::from_toml("[discovery]\nmax_concurrent_rss_checks = 2\n").unwrap();
        assert_eq!(config.discovery.max_concurrent_rss_checks, 2);
        assert_eq!(config.discovery.max_concurrent_path_checks, 3);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_full_config_file() {
        let dir = std::env::temp_dir().join("feedscout_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
[http]
timeout_secs = 20
priority_timeout_secs = 5
user_agent = "test-agent"
max_retries = 1

[http.proxy]
url = "http://proxy.internal:3128"
username = "alice"
password = "hunter2"

[discovery]
max_concurrent_rss_checks = 4
favicon_service = "https://icons.example.com/{host}.ico"
block_private_networks = false

[scripts]
dir = "/opt/feed-scripts"
timeout_secs = 60
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.http.priority_timeout(), Duration::from_secs(5));
        assert_eq!(config.http.user_agent, "test-agent");
        let proxy = config.http.proxy.as_ref().unwrap();
        assert_eq!(proxy.url, "http://proxy.internal:3128");
        assert_eq!(proxy.username.as_deref(), Some("alice"));
        assert_eq!(
            proxy.password.as_ref().map(|p| p.expose_secret()),
            Some("hunter2")
        );
        assert_eq!(config.discovery.max_concurrent_rss_checks, 4);
        assert!(!config.discovery.block_private_networks);
        assert_eq!(
            config.scripts.dir.as_deref(),
            Some(Path::new("/opt/feed-scripts"))
        );
        assert_eq!(config.scripts.timeout(), Duration::from_secs(60));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("totally_fake_key = 1\n[http]\ntimeout_secs = 7\n").unwrap();
        assert_eq!(config.http.timeout_secs, 7);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("[http]\ntimeout_secs = \"soon\"\n").is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedscout_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-015: Debug output masks the proxy password
    #[test]
    fn test_debug_masks_proxy_password() {
        let config = Config::from_toml(
            "[http.proxy]\nurl = \"http://p:1\"\npassword = \"super-secret-12345\"\n",
        )
        .unwrap();
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
