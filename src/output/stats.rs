//! Review database statistics
//!
//! Backs the `--stats` flag: per-product review totals plus the most
//! recent crawl runs, read from the SQLite output.

use crate::storage::{open_database, product_totals, recent_runs, ProductTotals, RunRecord};
use crate::HarvestError;
use std::path::Path;

/// Number of runs shown by `--stats`
pub const RECENT_RUN_LIMIT: usize = 10;

/// Review database summary
#[derive(Debug, Clone)]
pub struct ReviewStatistics {
    /// Review totals per product, largest first
    pub products: Vec<ProductTotals>,

    /// Latest crawl runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

impl ReviewStatistics {
    pub fn total_reviews(&self) -> u64 {
        self.products.iter().map(|p| p.reviews).sum()
    }
}

/// Loads statistics from the review database at `path`
pub fn load_statistics(path: &Path) -> Result<ReviewStatistics, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("review database {} does not exist", path.display()),
        )));
    }

    let conn = open_database(path)?;
    let products = product_totals(&conn)?;
    let recent_runs = recent_runs(&conn, RECENT_RUN_LIMIT)?;

    Ok(ReviewStatistics {
        products,
        recent_runs,
    })
}

/// Wall-clock duration of a finished run in seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = chrono::DateTime::parse_from_rfc3339(&run.started_at).ok()?;
    let finished = chrono::DateTime::parse_from_rfc3339(run.finished_at.as_deref()?).ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &ReviewStatistics) {
    println!("=== Review Statistics ===\n");

    println!("Overview:");
    println!("  Products: {}", stats.products.len());
    println!("  Reviews: {}", stats.total_reviews());
    println!();

    if !stats.products.is_empty() {
        println!("Reviews by Product:");
        for product in &stats.products {
            println!(
                "  {} ({}): {} reviews, average rating {:.2}",
                product.title, product.product_id, product.reviews, product.average_rating
            );
        }
        println!();
    }

    if stats.recent_runs.is_empty() {
        println!("No crawl runs recorded");
        return;
    }

    println!("Recent Runs ({}):", stats.recent_runs.len());
    for run in &stats.recent_runs {
        let outcome = run
            .termination_reason
            .as_deref()
            .unwrap_or("interrupted");
        let duration = run_duration_seconds(run)
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{} product {} started {} ({}): {} pages, {} with reviews, {} reviews stored [{}]",
            run.id,
            run.product_id,
            run.started_at,
            duration,
            run.pages_attempted,
            run.pages_succeeded,
            run.records_persisted,
            outcome
        );
    }
}
