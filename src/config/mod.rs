//! Configuration for NovaCrawler
//!
//! TOML configuration with kebab-case keys. Every field has a default, so
//! the crawler runs without a config file; validation catches nonsensical
//! values (zero workers, empty paths) before any component starts.

mod parser;
mod types;
mod validation;

pub use parser::{load_config, load_config_or_default};
pub use types::{Config, CrawlerConfig, FaviconConfig, RefreshConfig, StoreConfig};
pub use validation::validate;
