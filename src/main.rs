//! Review Harvester main entry point
//!
//! Command-line interface for crawling the paginated review listing of one
//! product.

use anyhow::Context;
use clap::Parser;
use review_harvester::config::{
    load_config_with_hash, load_output_config, validate, Config, CrawlMode,
};
use review_harvester::output::DedupeStrategy;
use review_harvester::CancellationToken;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Review Harvester: a paginating product review crawler
///
/// Walks the review listing of a single product page by page, going direct
/// or through a rotating proxy pool, and stores every review card it finds
/// as CSV or SQLite.
#[derive(Parser, Debug)]
#[command(name = "review-harvester")]
#[command(version)]
#[command(about = "A paginating product review crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (not needed with --dedupe)
    #[arg(value_name = "CONFIG", required_unless_present = "dedupe")]
    config: Option<PathBuf>,

    /// Product page URL to crawl, overriding the config
    #[arg(long, conflicts_with = "product")]
    url: Option<String>,

    /// Product id to crawl, overriding the config
    #[arg(long)]
    product: Option<String>,

    /// Page scheduling model, overriding the config
    #[arg(long, value_enum)]
    mode: Option<CrawlMode>,

    /// Last page to request, overriding the config
    #[arg(long, value_name = "N")]
    max_page: Option<u32>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the crawl plan without crawling
    #[arg(long, conflicts_with_all = ["check_proxies", "stats", "dedupe"])]
    dry_run: bool,

    /// Check every configured proxy and exit
    #[arg(long, conflicts_with_all = ["stats", "dedupe"])]
    check_proxies: bool,

    /// Show review statistics from the SQLite database and exit
    #[arg(long, conflicts_with = "dedupe")]
    stats: bool,

    /// Remove duplicate reviews from a CSV file and exit
    #[arg(long, value_name = "CSV")]
    dedupe: Option<PathBuf>,

    /// Which duplicate to keep with --dedupe
    #[arg(long, value_enum, default_value_t = DedupeStrategy::First, requires = "dedupe")]
    keep: DedupeStrategy,

    /// Where --dedupe writes its result (default: overwrite the input)
    #[arg(long, value_name = "PATH", requires = "dedupe")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Offline commands never touch the crawl settings
    if let Some(input) = &cli.dedupe {
        return handle_dedupe(input, cli.out.as_ref().unwrap_or(input), cli.keep);
    }
    let Some(config_path) = cli.config.as_deref() else {
        anyhow::bail!("a CONFIG file is required");
    };
    if cli.stats {
        return handle_stats(config_path);
    }

    tracing::info!("Loading configuration from: {}", config_path.display());
    let (mut config, config_hash) = load_config_with_hash(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::debug!("Configuration hash: {}", config_hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration after command-line overrides")?;

    if cli.check_proxies {
        handle_check_proxies(&config).await
    } else if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(&config, &config_hash).await
    }
}

/// Sets up the tracing subscriber; `RUST_LOG` wins when set
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "review_harvester=info,warn",
            1 => "review_harvester=debug,info",
            _ => "review_harvester=trace,debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.url {
        config.target.product_url = Some(url.clone());
        config.target.product_id = None;
    }
    if let Some(id) = &cli.product {
        config.target.product_id = Some(id.clone());
        config.target.product_url = None;
    }
    if let Some(mode) = cli.mode {
        config.crawler.mode = mode;
    }
    if let Some(max_page) = cli.max_page {
        config.crawler.max_page = max_page;
    }
}

/// Handles --dry-run: prints the effective crawl plan
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let product_id = config.target.resolve_product_id()?;
    let proxies = review_harvester::proxy::proxies_from_config(&config.proxy)?;

    println!("=== Review Harvester Dry Run ===\n");

    println!("Target:");
    println!("  Product: {}", product_id);
    println!("  Endpoint: {}", config.target.endpoint);
    println!(
        "  Product page: {}",
        review_harvester::url::product_page_url(&config.target.product_page_base, &product_id)
    );
    println!(
        "  Page size: {}, sort: {}",
        config.target.page_size,
        config.target.sort_by.as_query_value()
    );

    let crawler = &config.crawler;
    println!("\nCrawler:");
    println!("  Mode: {:?}", crawler.mode);
    println!("  Pages: 1..={}", crawler.max_page);
    if crawler.mode == CrawlMode::Batched {
        println!(
            "  Batch size: {}, global concurrency: {}",
            crawler.batch_size, crawler.global_concurrency
        );
    }
    println!(
        "  Attempts per page: {}, proxy switches per page: {}",
        crawler.max_attempts_per_page, crawler.max_proxy_switches_per_page
    );
    println!(
        "  Stop after {} empty pages; cooldown after {} blocks or {} network errors",
        crawler.max_empty_pages, crawler.max_consecutive_blocks, crawler.max_consecutive_timeouts
    );

    let delays = &config.delays;
    println!("\nDelays (seconds):");
    println!("  Normal: {}..{}", delays.normal.min, delays.normal.max);
    println!("  Retry: {}..{}", delays.retry.min, delays.retry.max);
    println!(
        "  Long cooldown: {}..{}",
        delays.long_cooldown.min, delays.long_cooldown.max
    );

    println!("\nProxies ({}):", proxies.len());
    for proxy in &proxies {
        println!("  - {}", proxy);
    }
    if proxies.is_empty() {
        println!("  (none, requests go direct)");
    }

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Directory: {}", config.output.directory);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles --check-proxies: checks every configured proxy
async fn handle_check_proxies(config: &Config) -> anyhow::Result<()> {
    let proxies = review_harvester::proxy::proxies_from_config(&config.proxy)?;
    if proxies.is_empty() {
        println!("No proxies configured");
        return Ok(());
    }

    println!(
        "Checking {} proxies against {}\n",
        proxies.len(),
        config.proxy.check_url
    );
    let results = review_harvester::proxy::check_all(
        &proxies,
        &config.proxy.check_url,
        config.target.connect_timeout() + config.target.read_timeout(),
    )
    .await;

    let reachable = results.iter().filter(|(_, ok)| *ok).count();
    for (proxy, ok) in &results {
        println!("  {} {}", if *ok { "✓" } else { "✗" }, proxy);
    }
    println!("\n{} of {} proxies reachable", reachable, results.len());

    Ok(())
}

/// Handles --stats: prints statistics from the review database
///
/// Only the `[output]` section of the config is read.
fn handle_stats(config_path: &Path) -> anyhow::Result<()> {
    use review_harvester::output::{load_statistics, print_statistics};

    let output = load_output_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let path = output.database_path();
    println!("Database: {}\n", path.display());

    let stats = load_statistics(&path)
        .with_context(|| format!("failed to read statistics from {}", path.display()))?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --dedupe: rewrites a CSV file without duplicate reviews
fn handle_dedupe(input: &Path, output: &Path, strategy: DedupeStrategy) -> anyhow::Result<()> {
    let analysis = review_harvester::output::dedupe_csv(input, output, strategy)
        .with_context(|| format!("failed to deduplicate {}", input.display()))?;

    println!("=== Deduplication ===\n");
    println!("  Input: {}", input.display());
    println!("  Output: {}", output.display());
    println!("  Reviews: {}", analysis.total);
    println!("  Unique: {}", analysis.unique);
    println!("  Duplicates removed: {}", analysis.duplicates);
    if !analysis.top.is_empty() {
        println!("\nMost repeated:");
        for (reviewer, count) in &analysis.top {
            println!("  {} x{}", reviewer, count);
        }
    }

    Ok(())
}

/// Handles the crawl itself; Ctrl-C cancels it cleanly
async fn handle_crawl(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page");
            on_signal.cancel();
        }
    });

    let report = review_harvester::run_crawl(config, config_hash, cancel)
        .await
        .context("crawl could not start")?;

    tracing::info!("Crawl finished: {}", report.reason);
    review_harvester::output::print_report(&report);

    Ok(())
}
