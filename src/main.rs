use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use feedscout::config::Config;
use feedscout::discovery::{DiscoveryService, Progress, ProgressCallback};
use feedscout::feed::{CommandScriptExecutor, FeedConfig, FeedKind, FeedParser, XPathRules};
use feedscout::http::HttpClient;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Get the config directory path (~/.config/feedscout/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedscout"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedscout",
    version,
    about = "Parse feeds by URL, script or XPath, and discover blogs through friend links"
)]
struct Args {
    /// Config file (default: ~/.config/feedscout/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse one feed and print it as JSON
    Parse(ParseArgs),
    /// Discover blogs linked from the friend pages behind the given feeds
    Discover {
        /// Seed feed URLs
        #[arg(required = true, value_name = "FEED_URL")]
        feeds: Vec<String>,

        /// File of already subscribed feed URLs, one per line
        #[arg(long, value_name = "FILE")]
        subscribed: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct ParseArgs {
    /// Feed or page URL
    #[arg(required_unless_present = "feed_config")]
    url: Option<String>,

    /// Read the whole feed configuration from a JSON file
    #[arg(long, value_name = "FILE", conflicts_with = "url")]
    feed_config: Option<PathBuf>,

    /// regular, html-xpath or xml-xpath
    #[arg(long, default_value = "regular", value_parser = parse_kind)]
    kind: FeedKind,

    /// Script path, relative to the configured scripts directory
    #[arg(long)]
    script: Option<String>,

    /// Single attempt with the short interactive timeout
    #[arg(long)]
    priority: bool,

    #[arg(long)]
    item: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    uri: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    timestamp: Option<String>,
    /// strftime-style format for --timestamp values
    #[arg(long)]
    time_format: Option<String>,
    #[arg(long)]
    thumbnail: Option<String>,
    #[arg(long)]
    categories: Option<String>,
    #[arg(long)]
    uid: Option<String>,
}

fn parse_kind(value: &str) -> Result<FeedKind, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown feed kind '{value}'"))
}

impl ParseArgs {
    fn into_feed_config(self) -> Result<FeedConfig> {
        if let Some(path) = &self.feed_config {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read feed config '{}'", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Invalid feed config '{}'", path.display()));
        }

        let Some(url) = self.url else {
            bail!("either a URL or --feed-config is required");
        };
        Ok(FeedConfig {
            url,
            kind: self.kind,
            script_path: self.script,
            xpath: XPathRules {
                item: self.item,
                title: self.title,
                content: self.content,
                uri: self.uri,
                author: self.author,
                timestamp: self.timestamp,
                time_format: self.time_format,
                thumbnail: self.thumbnail,
                categories: self.categories,
                uid: self.uid,
            },
        })
    }
}

/// Subscribed feed URLs, skipping blank lines and `#` comments.
fn read_subscribed(path: &Path) -> Result<HashSet<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read subscribed feeds '{}'", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

fn build_parser(config: &Config) -> Result<FeedParser> {
    let http = HttpClient::new(&config.http).context("Failed to build HTTP client")?;
    let parser = FeedParser::new(http);
    Ok(match &config.scripts.dir {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "Script executor enabled");
            parser.with_script_executor(
                Arc::new(CommandScriptExecutor::new(dir)),
                config.scripts.timeout(),
            )
        }
        None => parser,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON only
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    match args.command {
        Command::Parse(parse_args) => {
            let priority = parse_args.priority;
            let feed_config = parse_args.into_feed_config()?;
            let parser = build_parser(&config)?;
            let feed = parser
                .parse(&feed_config, priority)
                .await
                .with_context(|| format!("Failed to parse '{}'", feed_config.url))?;
            print_json(&feed)?;
        }
        Command::Discover { feeds, subscribed } => {
            let subscribed = match subscribed {
                Some(path) => read_subscribed(&path)?,
                None => HashSet::new(),
            };

            let parser = Arc::new(build_parser(&config)?);
            let service = DiscoveryService::new(parser, config.discovery.clone());

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Interrupted, finishing in-flight checks...");
                    on_interrupt.cancel();
                }
            });

            let progress: ProgressCallback = Arc::new(|p: &Progress| {
                if let Ok(line) = serde_json::to_string(p) {
                    eprintln!("{line}");
                }
            });

            let blogs = service
                .discover_many(&feeds, &subscribed, &cancel, Some(progress))
                .await;
            tracing::info!(found = blogs.len(), "Discovery finished");
            print_json(&blogs)?;
        }
    }

    Ok(())
}
