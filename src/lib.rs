//! NovaCrawler: a polite, resumable web crawler
//!
//! This crate crawls the web from seed URLs, extracts indexable metadata,
//! scores page relevance, refreshes stale records, and resolves site icons,
//! feeding a small SQLite store consumed by a search front end. Crawl and
//! refresh jobs run through a durable task queue with cooperative
//! cancellation and crash recovery.

pub mod config;
pub mod crawler;
pub mod favicon;
pub mod output;
pub mod request;
pub mod storage;
pub mod tasks;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Task {0} not found")]
    TaskNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use storage::{SqliteStore, Store};
pub use tasks::{Orchestrator, TaskKind, TaskStatus};
pub use url::{extract_domain, is_home_page, normalize_url};
