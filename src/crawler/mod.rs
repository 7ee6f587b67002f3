//! Crawler module for walking a paginated review listing
//!
//! This module contains the core crawling logic, including:
//! - request pacing with jittered delays and long cooldowns
//! - per-request header sets
//! - fetching and classifying one listing page
//! - per-page retry with proxy failover
//! - the pagination controller and its two scheduling models

mod backoff;
mod controller;
mod fetcher;
mod headers;
mod worker;

pub use backoff::{Backoff, DelayKind};
pub use controller::{run_crawl, CrawlReport, PaginationController};
pub use fetcher::{
    build_http_client, FetchOutcome, HttpPageFetcher, NetworkErrorKind, PageFetcher, PageRequest,
    Timeouts,
};
pub use headers::HeaderProfile;
pub use worker::{PageReport, PageResult, PageWorker, RetryPolicy};
