//! Per-page retry and proxy failover
//!
//! A [`PageWorker`] turns one page number into one [`PageReport`]. It owns
//! the bounded retry loop: attempts, proxy switches after blocks, empty-page
//! rechecks and retry pauses. It updates the proxy pool but never the crawl
//! session; the controller applies the report.
//!
//! # Per-page budget
//!
//! | Outcome | Consumes |
//! |---------|----------|
//! | `Blocked` through a proxy | a proxy switch while any remain, else an attempt |
//! | `Blocked` direct | an attempt |
//! | `NetworkError` | an attempt |
//! | `Empty` through a proxy | an empty recheck while any remain |
//!
//! The number of requests for a page is therefore at most
//! `max_attempts + min(max_switches, pool size) + empty_rechecks`.

use crate::config::{Config, CrawlerConfig, TargetConfig};
use crate::crawler::backoff::{Backoff, DelayKind};
use crate::crawler::fetcher::{FetchOutcome, PageFetcher, PageRequest, Timeouts};
use crate::crawler::headers::HeaderProfile;
use crate::proxy::{lock_pool, ProxyLease, SharedProxyPool};
use crate::state::{CancellationToken, FailureClass};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poll interval while every usable proxy is leased out
const ACQUIRE_POLL: Duration = Duration::from_millis(100);

/// Retry limits for one page
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_proxy_switches: u32,
    pub empty_rechecks: u32,
    pub allow_direct_fallback: bool,
    pub direct_bypass_fraction: f64,
}

impl RetryPolicy {
    pub fn from_config(crawler: &CrawlerConfig) -> Self {
        Self {
            max_attempts: crawler.max_attempts_per_page.max(1),
            max_proxy_switches: crawler.max_proxy_switches_per_page,
            empty_rechecks: crawler.empty_page_rechecks,
            allow_direct_fallback: crawler.allow_direct_fallback,
            direct_bypass_fraction: crawler.direct_bypass_fraction,
        }
    }
}

/// Final result for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    /// Body of the response that carried review cards
    Fetched { body: String },
    /// Answered with no review cards
    Empty,
    /// Retry budget spent; the class of the last failure
    Failed(FailureClass),
    /// Cancelled before the page was settled
    Cancelled,
    /// No proxy could be leased and direct requests are not allowed
    ProxyPoolExhausted,
}

/// What happened to one page
#[derive(Debug, Clone)]
pub struct PageReport {
    pub page: u32,
    pub result: PageResult,
    pub attempts: u32,
    pub proxy_switches: u32,
    pub requests_ok: u32,
    pub requests_failed: u32,
}

impl PageReport {
    fn new(page: u32) -> Self {
        Self {
            page,
            result: PageResult::Cancelled,
            attempts: 0,
            proxy_switches: 0,
            requests_ok: 0,
            requests_failed: 0,
        }
    }

    /// Total requests sent for the page
    pub fn requests(&self) -> u32 {
        self.requests_ok + self.requests_failed
    }

    fn finish(mut self, result: PageResult) -> Self {
        self.result = result;
        self
    }
}

enum Route {
    Proxy(ProxyLease),
    Direct,
    Exhausted,
    Cancelled,
}

/// Fetches single pages with retries; cheap to clone into concurrent tasks
pub struct PageWorker<F> {
    fetcher: Arc<F>,
    pool: Option<SharedProxyPool>,
    backoff: Backoff,
    headers: Arc<HeaderProfile>,
    timeouts: Timeouts,
    policy: RetryPolicy,
    target: Arc<TargetConfig>,
    product_id: Arc<str>,
    referer: Arc<str>,
    cancel: CancellationToken,
}

impl<F> Clone for PageWorker<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            pool: self.pool.clone(),
            backoff: self.backoff.clone(),
            headers: Arc::clone(&self.headers),
            timeouts: self.timeouts,
            policy: self.policy.clone(),
            target: Arc::clone(&self.target),
            product_id: Arc::clone(&self.product_id),
            referer: Arc::clone(&self.referer),
            cancel: self.cancel.clone(),
        }
    }
}

impl<F: PageFetcher> PageWorker<F> {
    pub fn new(config: &Config, product_id: &str, fetcher: Arc<F>) -> Self {
        let referer = crate::url::product_page_url(&config.target.product_page_base, product_id);
        Self {
            fetcher,
            pool: None,
            backoff: Backoff::new(config.delays.clone()),
            headers: Arc::new(HeaderProfile::from_config(&config.headers)),
            timeouts: Timeouts::from_target(&config.target),
            policy: RetryPolicy::from_config(&config.crawler),
            target: Arc::new(config.target.clone()),
            product_id: Arc::from(product_id),
            referer: Arc::from(referer.as_str()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_proxy_pool(mut self, pool: SharedProxyPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `page` until it settles or the retry budget is spent
    pub async fn fetch_page(&self, page: u32) -> PageReport {
        let mut report = PageReport::new(page);
        let switch_budget = self.switch_budget();
        let mut rechecks = 0;
        let mut direct_only = false;

        loop {
            if self.cancel.is_cancelled() {
                return report.finish(PageResult::Cancelled);
            }

            let lease = match self.choose_route(&mut direct_only).await {
                Route::Proxy(lease) => Some(lease),
                Route::Direct => None,
                Route::Exhausted => {
                    tracing::warn!("Page {}: no proxy available and direct requests are disabled", page);
                    return report.finish(PageResult::ProxyPoolExhausted);
                }
                Route::Cancelled => return report.finish(PageResult::Cancelled),
            };
            let proxied = lease.is_some();

            let request = PageRequest::new(&self.target, &self.product_id, page)
                .with_proxy(lease.as_ref().map(|l| l.endpoint().clone()));
            let headers = self.headers.build(Some(&*self.referer));

            let started = Instant::now();
            let outcome = self.fetcher.fetch(&request, headers, self.timeouts).await;
            let elapsed = started.elapsed();

            if let Some(lease) = lease {
                self.settle(lease, &outcome, elapsed);
            }

            tracing::debug!(
                "Page {} via {}: {}",
                page,
                request
                    .proxy
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "direct".to_string()),
                outcome.label()
            );

            let failure = match outcome {
                FetchOutcome::Success { body, .. } => {
                    report.requests_ok += 1;
                    return report.finish(PageResult::Fetched { body });
                }
                FetchOutcome::Empty => {
                    report.requests_ok += 1;
                    if proxied && rechecks < self.policy.empty_rechecks {
                        rechecks += 1;
                        tracing::debug!("Page {} empty, rechecking through another proxy", page);
                        if !self.retry_pause().await {
                            return report.finish(PageResult::Cancelled);
                        }
                        continue;
                    }
                    return report.finish(PageResult::Empty);
                }
                FetchOutcome::Blocked { status } => {
                    report.requests_failed += 1;
                    tracing::warn!("Page {} blocked (HTTP {})", page, status);
                    if proxied && report.proxy_switches < switch_budget {
                        report.proxy_switches += 1;
                        if !self.retry_pause().await {
                            return report.finish(PageResult::Cancelled);
                        }
                        continue;
                    }
                    FailureClass::Blocked
                }
                FetchOutcome::NetworkError { kind } => {
                    report.requests_failed += 1;
                    tracing::debug!("Page {} network error: {:?}", page, kind);
                    FailureClass::Network
                }
            };

            report.attempts += 1;
            if report.attempts >= self.policy.max_attempts {
                return report.finish(PageResult::Failed(failure));
            }
            if !self.retry_pause().await {
                return report.finish(PageResult::Cancelled);
            }
        }
    }

    fn switch_budget(&self) -> u32 {
        match &self.pool {
            Some(pool) => {
                let size = u32::try_from(lock_pool(pool).len()).unwrap_or(u32::MAX);
                self.policy.max_proxy_switches.min(size)
            }
            None => 0,
        }
    }

    /// Picks the route for the next attempt
    ///
    /// With fallback allowed the pool is skipped for the rest of the page once
    /// the quarantined share passes the bypass fraction, checked before any
    /// acquisition so the pool's quarantine reset cannot mask it. A failed
    /// acquisition also goes direct. Without fallback the worker waits while
    /// proxies are merely busy and reports exhaustion when none are left.
    async fn choose_route(&self, direct_only: &mut bool) -> Route {
        let Some(pool) = &self.pool else {
            return Route::Direct;
        };
        if *direct_only {
            return Route::Direct;
        }

        loop {
            let busy = {
                let mut pool = lock_pool(pool);
                if self.policy.allow_direct_fallback {
                    let fraction = pool.quarantined_fraction();
                    if fraction > self.policy.direct_bypass_fraction {
                        *direct_only = true;
                        tracing::info!(
                            "{:.0}% of proxies quarantined, bypassing the pool for this page",
                            fraction * 100.0
                        );
                        return Route::Direct;
                    }
                }

                if let Some(lease) = pool.acquire() {
                    return Route::Proxy(lease);
                }
                if self.policy.allow_direct_fallback {
                    return Route::Direct;
                }

                pool.in_flight_count() > 0
            };

            if !busy {
                return Route::Exhausted;
            }
            if !self.backoff.sleep(ACQUIRE_POLL, &self.cancel).await {
                return Route::Cancelled;
            }
        }
    }

    /// Records the outcome against the proxy and returns the lease
    fn settle(&self, lease: ProxyLease, outcome: &FetchOutcome, elapsed: Duration) {
        let Some(pool) = &self.pool else {
            return;
        };
        let mut pool = lock_pool(pool);
        match outcome {
            FetchOutcome::Success { .. } | FetchOutcome::Empty => {
                pool.record_success(&lease, elapsed)
            }
            FetchOutcome::Blocked { .. } | FetchOutcome::NetworkError { .. } => {
                pool.record_failure(&lease);
            }
        }
        pool.release(lease);
    }

    async fn retry_pause(&self) -> bool {
        let delay = self.backoff.delay_for(DelayKind::Retry);
        self.backoff.sleep(delay, &self.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayConfig;
    use crate::crawler::fetcher::NetworkErrorKind;
    use crate::crawler::tests::ScriptedFetcher;
    use crate::proxy::{PoolPolicy, ProxyEndpoint, ProxyPool};

    fn config(max_attempts: u32) -> Config {
        let mut config = Config::default();
        config.delays = DelayConfig::none();
        config.crawler.max_attempts_per_page = max_attempts;
        config
    }

    fn pool(n: usize) -> SharedProxyPool {
        let endpoints = (0..n)
            .map(|i| ProxyEndpoint::new(format!("10.1.0.{}", i + 1), 3128))
            .collect();
        ProxyPool::new(endpoints, PoolPolicy::default()).into_shared()
    }

    fn success() -> FetchOutcome {
        FetchOutcome::Success {
            body: "<article></article>".to_string(),
            elapsed: Duration::from_millis(10),
        }
    }

    fn timeout() -> FetchOutcome {
        FetchOutcome::NetworkError {
            kind: NetworkErrorKind::Timeout,
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![success()]));
        let worker = PageWorker::new(&config(3), "7", Arc::clone(&fetcher));

        let report = worker.fetch_page(1).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(report.requests(), 1);
        assert_eq!(fetcher.requests()[0].page, 1);
        assert!(fetcher.requests()[0].proxy.is_none());
    }

    #[tokio::test]
    async fn test_network_errors_retry_then_fail() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![timeout(), timeout(), timeout()]));
        let worker = PageWorker::new(&config(3), "7", Arc::clone(&fetcher));

        let report = worker.fetch_page(2).await;
        assert_eq!(report.result, PageResult::Failed(FailureClass::Network));
        assert_eq!(report.attempts, 3);
        assert_eq!(report.requests_failed, 3);
        assert!(fetcher.requests().iter().all(|r| r.page == 2));
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![timeout(), success()]));
        let worker = PageWorker::new(&config(3), "7", fetcher);

        let report = worker.fetch_page(1).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(report.requests_ok, 1);
        assert_eq!(report.requests_failed, 1);
    }

    #[tokio::test]
    async fn test_block_switches_proxy_on_same_page() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            FetchOutcome::Blocked { status: 403 },
            success(),
        ]));
        let pool = pool(3);
        let worker = PageWorker::new(&config(1), "7", Arc::clone(&fetcher))
            .with_proxy_pool(Arc::clone(&pool));

        let report = worker.fetch_page(4).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(report.proxy_switches, 1);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.page == 4 && r.proxy.is_some()));

        let pool = lock_pool(&pool);
        let failures: u32 = pool.handles().iter().map(|h| h.failure_count()).sum();
        let successes: u32 = pool.handles().iter().map(|h| h.success_count()).sum();
        assert_eq!((failures, successes), (1, 1));
        assert_eq!(pool.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_requests_per_page_are_bounded() {
        let blocks = vec![FetchOutcome::Blocked { status: 429 }; 50];
        let fetcher = Arc::new(ScriptedFetcher::new(blocks));
        let mut config = config(2);
        config.crawler.max_proxy_switches_per_page = 5;
        let worker = PageWorker::new(&config, "7", Arc::clone(&fetcher)).with_proxy_pool(pool(3));

        let report = worker.fetch_page(1).await;
        assert_eq!(report.result, PageResult::Failed(FailureClass::Blocked));
        // Switches are capped by the pool size
        assert_eq!(report.proxy_switches, 3);
        assert_eq!(fetcher.requests().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_recheck_through_proxy() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![FetchOutcome::Empty, success()]));
        let mut config = config(1);
        config.crawler.empty_page_rechecks = 1;
        let worker = PageWorker::new(&config, "7", Arc::clone(&fetcher)).with_proxy_pool(pool(2));

        let report = worker.fetch_page(3).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_without_proxy_is_not_rechecked() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![FetchOutcome::Empty, success()]));
        let mut config = config(1);
        config.crawler.empty_page_rechecks = 2;
        let worker = PageWorker::new(&config, "7", Arc::clone(&fetcher));

        let report = worker.fetch_page(3).await;
        assert_eq!(report.result, PageResult::Empty);
        assert_eq!(fetcher.requests().len(), 1);
    }

    /// One proxy, quarantined, with a policy that never clears it
    fn dead_pool() -> SharedProxyPool {
        let policy = PoolPolicy {
            reset_fraction: 1.0,
            ..PoolPolicy::default()
        };
        let pool = ProxyPool::new(vec![ProxyEndpoint::new("10.9.9.9", 1)], policy).into_shared();
        {
            let mut guard = lock_pool(&pool);
            let lease = guard.acquire().unwrap();
            while !guard.handles()[0].is_quarantined() {
                guard.record_failure(&lease);
            }
            guard.release(lease);
        }
        pool
    }

    #[tokio::test]
    async fn test_exhausted_pool_without_fallback() {
        let mut config = config(3);
        config.crawler.allow_direct_fallback = false;

        let fetcher = Arc::new(ScriptedFetcher::new(vec![success()]));
        let worker =
            PageWorker::new(&config, "7", Arc::clone(&fetcher)).with_proxy_pool(dead_pool());

        let report = worker.fetch_page(1).await;
        assert_eq!(report.result, PageResult::ProxyPoolExhausted);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_pool_with_fallback_goes_direct() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![timeout(), success()]));
        let worker =
            PageWorker::new(&config(3), "7", Arc::clone(&fetcher)).with_proxy_pool(dead_pool());

        let report = worker.fetch_page(1).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(fetcher.requests().len(), 2);
        assert!(fetcher.requests().iter().all(|r| r.proxy.is_none()));
    }

    #[tokio::test]
    async fn test_mostly_quarantined_pool_is_bypassed() {
        // Default policy: bypass and quarantine reset both sit at 70%
        let pool = pool(10);
        {
            let mut guard = lock_pool(&pool);
            while guard.quarantined_count() < 8 {
                let lease = guard.acquire().unwrap();
                let before = guard.quarantined_count();
                while guard.quarantined_count() == before {
                    guard.record_failure(&lease);
                }
                guard.release(lease);
            }
        }

        let fetcher = Arc::new(ScriptedFetcher::new(vec![success()]));
        let worker = PageWorker::new(&config(3), "7", Arc::clone(&fetcher))
            .with_proxy_pool(Arc::clone(&pool));

        let report = worker.fetch_page(1).await;
        assert!(matches!(report.result, PageResult::Fetched { .. }));
        assert_eq!(fetcher.requests().len(), 1);
        assert!(fetcher.requests()[0].proxy.is_none());
        // The pool was skipped, not reset
        assert_eq!(lock_pool(&pool).quarantined_count(), 8);
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![success()]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let worker =
            PageWorker::new(&config(3), "7", Arc::clone(&fetcher)).with_cancellation(cancel);

        let report = worker.fetch_page(1).await;
        assert_eq!(report.result, PageResult::Cancelled);
        assert!(fetcher.requests().is_empty());
    }
}
