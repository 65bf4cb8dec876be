use crate::config::types::{Config, CrawlerConfig, FaviconConfig, RefreshConfig, StoreConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_store_config(&config.store)?;
    validate_favicon_config(&config.favicons)?;
    validate_refresh_config(&config.refresh)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 60 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 60, got {}",
            config.request_timeout_secs
        )));
    }

    if config.retry_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-attempts must be >= 1, got {}",
            config.retry_attempts
        )));
    }

    Ok(())
}

/// Validates store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.favicon_dir.is_empty() {
        return Err(ConfigError::Validation(
            "favicon-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates favicon configuration
fn validate_favicon_config(config: &FaviconConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 500 {
        return Err(ConfigError::Validation(format!(
            "favicons.max-concurrent must be between 1 and 500, got {}",
            config.max_concurrent
        )));
    }

    Ok(())
}

/// Validates refresh configuration
fn validate_refresh_config(config: &RefreshConfig) -> Result<(), ConfigError> {
    if config.interval_mins < 1 {
        return Err(ConfigError::Validation(format!(
            "refresh.interval-mins must be >= 1, got {}",
            config.interval_mins
        )));
    }

    if config.freshness_days < 1 {
        return Err(ConfigError::Validation(format!(
            "refresh.freshness-days must be >= 1, got {}",
            config.freshness_days
        )));
    }

    Ok(())
}
