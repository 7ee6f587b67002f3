//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlSession`: per-crawl counters (page cursor, empty/blocked streaks, totals)
//! - `CrawlState` / `TerminationReason`: controller state and why it stopped
//! - `CancellationToken`: cooperative cancellation shared with the signal handler
//!   (re-exported from `tokio-util`)

mod session;
mod termination;

// Re-export main types
pub use session::{CrawlSession, FailureClass};
pub use termination::{CrawlState, TerminationReason};
pub use tokio_util::sync::CancellationToken;
