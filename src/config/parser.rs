use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

/// Loads the configuration if the file exists, otherwise returns defaults
///
/// A missing config file is not an error: every field has a usable default,
/// so the binary can run without one.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
workers = 4
default-depth = 3
request-timeout-secs = 5
retry-attempts = 3
retry-delay-ms = 5000

[store]
database-path = "./test.db"
favicon-dir = "./icons"

[favicons]
max-concurrent = 20

[refresh]
interval-mins = 15
freshness-days = 7
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.workers, 4);
        assert_eq!(config.crawler.default_depth, 3);
        assert_eq!(config.store.database_path, "./test.db");
        assert_eq!(config.favicons.max_concurrent, 20);
        assert_eq!(config.refresh.interval_mins, 15);
        assert_eq!(config.refresh.freshness_days, 7);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = create_temp_config("[crawler]\nworkers = 2\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.workers, 2);
        assert_eq!(config.crawler.retry_attempts, 3);
        assert_eq!(config.crawler.retry_delay_ms, 5000);
        assert_eq!(config.store.database_path, "links.db");
        assert_eq!(config.refresh.freshness_days, 14);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nworkers = 0\n");
        let result = load_config(file.path());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.crawler.workers, 10);
    }
}
