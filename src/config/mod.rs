//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; omitted keys fall back to defaults tuned for the
//! review listing endpoint.
//!
//! # Example
//!
//! ```no_run
//! use review_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawling up to page {}", config.crawler.max_page);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlMode, CrawlerConfig, DelayConfig, DelayRange, HeaderConfig, OutputConfig,
    OutputFormat, ProxyConfig, SortKey, TargetConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_output_config, parse_config,
};
pub use validation::{validate, MAX_PAGE_LIMIT};
