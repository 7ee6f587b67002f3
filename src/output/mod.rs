//! Output module for everything printed or post-processed after a crawl
//!
//! This module handles:
//! - Printing the end-of-crawl report
//! - Review database statistics for `--stats`
//! - Duplicate removal over CSV output for `--dedupe`

mod dedupe;
mod report;
pub mod stats;

pub use dedupe::{analyze_duplicates, dedupe_csv, dedupe_records, DedupeStrategy, DuplicateAnalysis};
pub use report::{format_report, print_report};
pub use stats::{load_statistics, print_statistics, ReviewStatistics};
