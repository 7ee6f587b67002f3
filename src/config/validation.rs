use crate::config::types::{
    Config, CrawlerConfig, DelayConfig, DelayRange, OutputConfig, ProxyConfig, TargetConfig,
};
use crate::proxy::ProxyEndpoint;
use crate::ConfigError;
use url::Url;

/// Highest `max-page` accepted
pub const MAX_PAGE_LIMIT: u32 = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_delay_config(&config.delays)?;
    validate_proxy_config(&config.proxy)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the target endpoint and request shape
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    validate_http_url("endpoint", &config.endpoint)?;
    validate_http_url("product-page-base", &config.product_page_base)?;

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.blocked_statuses.contains(&200) {
        return Err(ConfigError::Validation(
            "blocked-statuses cannot contain 200; use block-markers instead".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 || config.read_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got connect={}s read={}s",
            config.connect_timeout_secs, config.read_timeout_secs
        )));
    }

    // A product given here must be well formed; absence is checked at crawl start
    if config.product_id.is_some() || config.product_url.is_some() {
        config.resolve_product_id()?;
    }

    Ok(())
}

/// Validates pagination and concurrency limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let at_least_one = [
        ("max-attempts-per-page", config.max_attempts_per_page),
        ("max-proxy-switches-per-page", config.max_proxy_switches_per_page),
        ("max-empty-pages", config.max_empty_pages),
        ("max-consecutive-timeouts", config.max_consecutive_timeouts),
        ("max-consecutive-blocks", config.max_consecutive_blocks),
        ("max-block-cooldowns", config.max_block_cooldowns),
        ("max-page", config.max_page),
        ("per-proxy-concurrency", config.per_proxy_concurrency),
    ];
    for (name, value) in at_least_one {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.max_page > MAX_PAGE_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-page must be <= {}, got {}",
            MAX_PAGE_LIMIT, config.max_page
        )));
    }

    if config.batch_size < 1 || config.batch_size > 50 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be between 1 and 50, got {}",
            config.batch_size
        )));
    }

    if config.global_concurrency < 1 || config.global_concurrency > 200 {
        return Err(ConfigError::Validation(format!(
            "global-concurrency must be between 1 and 200, got {}",
            config.global_concurrency
        )));
    }

    validate_fraction("direct-bypass-fraction", config.direct_bypass_fraction)?;

    Ok(())
}

/// Validates the per-kind delay ranges
fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    validate_range("delays.normal", &config.normal)?;
    validate_range("delays.retry", &config.retry)?;
    validate_range("delays.long-cooldown", &config.long_cooldown)?;
    Ok(())
}

fn validate_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if !range.min.is_finite() || !range.max.is_finite() || range.min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be finite and non-negative, got [{}, {}]",
            name, range.min, range.max
        )));
    }

    if range.min > range.max {
        return Err(ConfigError::Validation(format!(
            "{} min ({}) cannot exceed max ({})",
            name, range.min, range.max
        )));
    }

    Ok(())
}

/// Validates the quarantine policy and inline proxy entries
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.quarantine_failures < 1 {
        return Err(ConfigError::Validation(
            "quarantine-failures must be >= 1".to_string(),
        ));
    }

    if config.quarantine_hard_failures < config.quarantine_failures {
        return Err(ConfigError::Validation(format!(
            "quarantine-hard-failures ({}) must be >= quarantine-failures ({})",
            config.quarantine_hard_failures, config.quarantine_failures
        )));
    }

    validate_fraction(
        "quarantine-min-success-rate",
        config.quarantine_min_success_rate,
    )?;
    validate_fraction("reset-fraction", config.reset_fraction)?;

    for entry in &config.addresses {
        ProxyEndpoint::parse(entry)?;
    }

    if let Some(file) = &config.file {
        if file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "proxy.file cannot be empty".to_string(),
            ));
        }
    }

    validate_http_url("check-url", &config.check_url)?;

    Ok(())
}

/// Validates output configuration
pub(crate) fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.database_file.is_empty() {
        return Err(ConfigError::Validation(
            "database-file cannot be empty".to_string(),
        ));
    }

    if config.flush_every < 1 {
        return Err(ConfigError::Validation(
            "flush-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}
