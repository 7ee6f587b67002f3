//! Integration tests for the review crawler
//!
//! These tests use wiremock to stand in for the review listing endpoint and
//! the product page.

mod crawl_tests;
mod fetch_tests;
mod fixtures;
mod title_tests;
