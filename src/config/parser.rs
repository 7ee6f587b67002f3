use crate::config::types::{Config, OutputConfig};
use crate::config::validation::{validate, validate_output_config};
use crate::ConfigError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
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
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use review_harvester::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max page: {}", config.crawler.max_page);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// The `[output]` table on its own; every other table is ignored
#[derive(Deserialize)]
struct OutputSection {
    #[serde(default)]
    output: OutputConfig,
}

/// Loads only the output settings of a configuration file
///
/// Offline commands such as `--stats` need the database location but none of
/// the crawl settings, so the other sections are neither parsed nor validated.
pub fn load_output_config(path: &Path) -> Result<OutputConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let section: OutputSection = toml::from_str(&content)?;
    validate_output_config(&section.output)?;
    Ok(section.output)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with every crawl run so results can be traced back to the settings
/// that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
