use serde::Deserialize;

/// Main configuration structure for NovaCrawler
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub favicons: FaviconConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Default crawl depth when a task does not specify one
    #[serde(rename = "default-depth", default = "default_depth")]
    pub default_depth: u32,

    /// Request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per URL when rate limited (429)
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between rate-limited attempts, in milliseconds
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_depth: default_depth(),
            request_timeout_secs: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Store paths configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Directory where downloaded favicons are written
    #[serde(rename = "favicon-dir", default = "default_favicon_dir")]
    pub favicon_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            favicon_dir: default_favicon_dir(),
        }
    }
}

/// Favicon resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FaviconConfig {
    /// Maximum concurrent icon fetches
    #[serde(rename = "max-concurrent", default = "default_favicon_concurrency")]
    pub max_concurrent: usize,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_favicon_concurrency(),
        }
    }
}

/// Stale-refresh scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Minutes between scheduled stale-refresh tasks
    #[serde(rename = "interval-mins", default = "default_refresh_interval")]
    pub interval_mins: u64,

    /// Pages older than this many days are considered stale
    #[serde(rename = "freshness-days", default = "default_freshness_days")]
    pub freshness_days: i64,

    /// Command spawned to perform a refresh pass (program + arguments).
    /// Empty means "this binary's `refresh` subcommand".
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_mins: default_refresh_interval(),
            freshness_days: default_freshness_days(),
            command: Vec::new(),
        }
    }
}

fn default_workers() -> usize {
    10
}

fn default_depth() -> u32 {
    2
}

fn default_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_database_path() -> String {
    "links.db".to_string()
}

fn default_favicon_dir() -> String {
    "favicons".to_string()
}

fn default_favicon_concurrency() -> usize {
    100
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_freshness_days() -> i64 {
    14
}
