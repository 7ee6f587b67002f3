use crate::url::product_code_from_url;
use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for a review crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub headers: HeaderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where and what to crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetConfig {
    /// Product page URL; the product id is taken from the path after `products/`
    pub product_url: Option<String>,

    /// Explicit product id, wins over `product_url`
    pub product_id: Option<String>,

    /// Review listing endpoint
    pub endpoint: String,

    /// Product page prefix, used for the referer header and title lookup
    pub product_page_base: String,

    /// Reviews per page
    pub page_size: u32,

    pub sort_by: SortKey,

    /// Rating filter passed through as-is (empty = all ratings)
    pub ratings: String,

    /// Search query within reviews
    pub query: String,

    pub vi_role_code: u32,

    pub rating_summary: bool,

    /// HTTP statuses classified as a remote block
    pub blocked_statuses: Vec<u16>,

    /// Lower-case body fingerprints that mark a card-less 200 page as blocked
    pub block_markers: Vec<String>,

    pub connect_timeout_secs: u64,

    pub read_timeout_secs: u64,

    pub accept_invalid_certs: bool,
}

impl TargetConfig {
    /// Product id to crawl: the explicit id, else the one parsed from the product URL
    pub fn resolve_product_id(&self) -> Result<String, ConfigError> {
        if let Some(id) = self
            .product_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            return Ok(id.to_string());
        }

        match self.product_url.as_deref() {
            Some(url) => product_code_from_url(url),
            None => Err(ConfigError::MissingProduct),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            product_url: None,
            product_id: None,
            endpoint: "https://www.coupang.com/vp/product/reviews".to_string(),
            product_page_base: "https://www.coupang.com/vp/products/".to_string(),
            page_size: 5,
            sort_by: SortKey::default(),
            ratings: String::new(),
            query: String::new(),
            vi_role_code: 2,
            rating_summary: true,
            blocked_statuses: vec![403, 429, 503, 504],
            block_markers: Vec::new(),
            connect_timeout_secs: 15,
            read_timeout_secs: 30,
            accept_invalid_certs: false,
        }
    }
}

/// Review ordering understood by the listing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    OrderScoreAsc,
    Latest,
}

impl SortKey {
    /// Value sent as the `sortBy` query parameter
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::OrderScoreAsc => "ORDER_SCORE_ASC",
            Self::Latest => "DATE_DESC",
        }
    }
}

/// How pages are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlMode {
    /// One page at a time, strictly increasing
    #[default]
    Sequential,
    /// Fixed-size batches of pages fetched concurrently
    Batched,
}

/// Pagination, retry and concurrency limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    pub mode: CrawlMode,

    /// Attempts per page before the page is given up on
    pub max_attempts_per_page: u32,

    /// Proxy switches per page after blocks
    pub max_proxy_switches_per_page: u32,

    /// Extra attempts through another proxy before accepting an empty page
    pub empty_page_rechecks: u32,

    /// Consecutive empty pages that end the crawl
    pub max_empty_pages: u32,

    /// Consecutive timed-out pages before a long cooldown
    pub max_consecutive_timeouts: u32,

    /// Consecutive blocked pages before a long cooldown
    pub max_consecutive_blocks: u32,

    /// Block cooldowns without any progress in between before giving up
    pub max_block_cooldowns: u32,

    /// Hard page ceiling
    pub max_page: u32,

    pub batch_size: u32,

    pub global_concurrency: u32,

    pub per_proxy_concurrency: u32,

    /// Go direct when no proxy can be acquired
    pub allow_direct_fallback: bool,

    /// Quarantined fraction above which a failed acquisition switches the rest of the page to direct requests
    pub direct_bypass_fraction: f64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: CrawlMode::default(),
            max_attempts_per_page: 3,
            max_proxy_switches_per_page: 5,
            empty_page_rechecks: 0,
            max_empty_pages: 3,
            max_consecutive_timeouts: 3,
            max_consecutive_blocks: 3,
            max_block_cooldowns: 3,
            max_page: 100,
            batch_size: 5,
            global_concurrency: 80,
            per_proxy_concurrency: 1,
            allow_direct_fallback: true,
            direct_bypass_fraction: 0.7,
        }
    }
}

/// A `[min, max]` range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn zero() -> Self {
        Self { min: 0.0, max: 0.0 }
    }
}

/// Per-kind delay ranges
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DelayConfig {
    /// Between pages
    pub normal: DelayRange,
    /// Between attempts on the same page
    pub retry: DelayRange,
    /// After repeated timeouts or blocks
    pub long_cooldown: DelayRange,
}

impl DelayConfig {
    /// All delays zero; useful for tests and dry runs
    pub fn none() -> Self {
        Self {
            normal: DelayRange::zero(),
            retry: DelayRange::zero(),
            long_cooldown: DelayRange::zero(),
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            normal: DelayRange::new(3.0, 10.0),
            retry: DelayRange::new(2.0, 8.0),
            long_cooldown: DelayRange::new(300.0, 420.0),
        }
    }
}

/// Proxy list and quarantine policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProxyConfig {
    /// Proxy list file, one `ip:port` or `ip:port:user:pass` per line
    pub file: Option<String>,

    /// Inline proxy entries, same formats as the file
    pub addresses: Vec<String>,

    pub quarantine_failures: u32,

    pub quarantine_min_success_rate: f64,

    pub quarantine_hard_failures: u32,

    /// Quarantined fraction above which the whole quarantine set is cleared
    pub reset_fraction: f64,

    /// URL fetched by `--check-proxies`
    pub check_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            file: None,
            addresses: Vec::new(),
            quarantine_failures: 3,
            quarantine_min_success_rate: 0.5,
            quarantine_hard_failures: 5,
            reset_fraction: 0.7,
            check_url: "http://httpbin.org/ip".to_string(),
        }
    }
}

/// Request header profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HeaderConfig {
    /// User agents to rotate through; empty means the built-in pool
    pub user_agents: Vec<String>,

    pub accept_language: String,

    pub cookie: Option<String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_agents: Vec::new(),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            cookie: None,
        }
    }
}

/// Record sink selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Output directory, created when missing
    pub directory: String,

    /// SQLite file name inside `directory`
    pub database_file: String,

    /// Records between flushes
    pub flush_every: u32,

    /// Title used when the product title cannot be resolved
    pub fallback_title: String,

    /// Look the product title up on the product page
    pub resolve_title: bool,
}

impl OutputConfig {
    pub fn database_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.directory).join(&self.database_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            directory: "Coupang-reviews".to_string(),
            database_file: "reviews.db".to_string(),
            flush_every: 10,
            fallback_title: "Unknown product".to_string(),
            resolve_title: true,
        }
    }
}
