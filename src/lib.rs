//! Review Harvester: a paginating review crawler
//!
//! This crate walks the paginated review listing of a single product, extracts
//! structured review records from each page and hands them to a record sink.
//! Requests go out directly or through a rotating proxy pool, with jittered
//! pacing, bounded per-page retries, proxy failover and long cooldowns when the
//! remote service starts refusing us.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod proxy;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
///
/// Fetch outcomes (blocked, empty, timeouts) are never errors; they are
/// reported as [`crawler::FetchOutcome`] values. Only configuration problems
/// and unexpected local failures surface here.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy entry: {0}")]
    InvalidProxy(String),

    #[error("No product identifier given (set target.product-url, target.product-id or pass --url)")]
    MissingProduct,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlReport, FetchOutcome, PaginationController};
pub use extract::{ExtractionAdapter, ReviewRecord};
pub use proxy::{ProxyEndpoint, ProxyPool};
pub use state::{CancellationToken, CrawlSession, TerminationReason};
pub use storage::RecordSink;
