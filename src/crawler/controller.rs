//! Pagination controller
//!
//! The controller walks the listing page by page until exactly one
//! termination condition fires. Page fetching and its retries live in
//! [`PageWorker`]; the controller applies each [`PageReport`] to the
//! [`CrawlSession`], persists records and decides what happens next.
//!
//! # Page outcomes
//!
//! | Result | Session update | Next |
//! |--------|----------------|------|
//! | records | reset empty and failure streaks | next page |
//! | empty | `consecutive_empty += 1` | next page, or stop at `max-empty-pages` |
//! | failed (blocked / network) | class streak `+= 1`, page recorded as skipped | next page; long cooldown at the class threshold |
//! | cancelled | none | stop (`UserCancelled`) |
//! | pool exhausted | none | stop (`ProxyPoolExhausted`) |
//!
//! A block cooldown that is not followed by any progress counts towards
//! `max-block-cooldowns`; crossing the block threshold again after that many
//! cooldowns stops the crawl with `MaxBlockedReached`.

use crate::config::{Config, CrawlMode, CrawlerConfig, OutputFormat};
use crate::crawler::backoff::{Backoff, DelayKind};
use crate::crawler::fetcher::{HttpPageFetcher, PageFetcher, Timeouts};
use crate::crawler::headers::HeaderProfile;
use crate::crawler::worker::{PageReport, PageResult, PageWorker};
use crate::extract::{
    ExtractionAdapter, FixedTitle, ProductPageTitleResolver, ReviewCardExtractor, TitleResolver,
};
use crate::proxy::{
    lock_pool, proxies_from_config, PoolPolicy, ProxyPool, ProxySnapshot, SharedProxyPool,
};
use crate::state::{CancellationToken, CrawlSession, CrawlState, FailureClass, TerminationReason};
use crate::storage::{CsvSink, RecordSink, RunLog, SqliteSink};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Summary of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub product_id: String,
    pub title: String,
    pub reason: TerminationReason,
    pub pages_attempted: u32,
    pub pages_succeeded: u32,
    pub pages_empty: u32,
    pub pages_failed: u32,

    /// Pages given up on after their retry budget
    pub failed_pages: Vec<u32>,

    /// Last page number handed out
    pub last_page: u32,
    pub records_extracted: u64,
    pub records_persisted: u64,
    pub persist_failures: u64,
    pub requests_ok: u64,
    pub requests_failed: u64,
    pub cooldowns: u32,
    pub elapsed: Duration,

    /// Per-proxy statistics; empty for direct crawls
    pub proxies: Vec<ProxySnapshot>,
}

/// Drives the page loop for one product
pub struct PaginationController<F> {
    worker: PageWorker<F>,
    extractor: Arc<dyn ExtractionAdapter>,
    sink: Box<dyn RecordSink>,
    session: CrawlSession,
    state: CrawlState,
    limits: CrawlerConfig,
    backoff: Backoff,
    title: String,
    pool: Option<SharedProxyPool>,
    cancel: CancellationToken,
}

impl<F: PageFetcher + 'static> PaginationController<F> {
    pub fn new(
        config: &Config,
        product_id: impl Into<String>,
        title: impl Into<String>,
        fetcher: Arc<F>,
        extractor: Arc<dyn ExtractionAdapter>,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        let product_id = product_id.into();
        Self {
            worker: PageWorker::new(config, &product_id, fetcher),
            extractor,
            sink,
            session: CrawlSession::new(product_id),
            state: CrawlState::Running,
            limits: config.crawler.clone(),
            backoff: Backoff::new(config.delays.clone()),
            title: title.into(),
            pool: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Routes requests through `pool`
    pub fn with_proxy_pool(mut self, pool: SharedProxyPool) -> Self {
        self.worker = self.worker.with_proxy_pool(Arc::clone(&pool));
        self.pool = Some(pool);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.worker = self.worker.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Runs the crawl to termination
    pub async fn run(&mut self) -> CrawlReport {
        tracing::info!(
            "Crawling reviews for product {} ({}, {:?} mode, max page {})",
            self.session.product_id,
            self.title,
            self.limits.mode,
            self.limits.max_page
        );

        let reason = match self.limits.mode {
            CrawlMode::Sequential => self.run_sequential().await,
            CrawlMode::Batched => self.run_batched().await,
        };

        if let Err(e) = self.sink.flush() {
            tracing::warn!("Failed to flush record sink: {}", e);
        }

        self.state = CrawlState::Terminated(reason);
        tracing::info!(
            "Crawl finished: {} ({} pages, {} records, {} skipped pages)",
            reason,
            self.session.pages_attempted,
            self.session.records_persisted,
            self.session.failed_pages.len()
        );

        self.report(reason)
    }

    async fn run_sequential(&mut self) -> TerminationReason {
        loop {
            if let Some(reason) = self.stop_before_page() {
                return reason;
            }

            let page = self.session.current_page;
            let report = self.worker.fetch_page(page).await;
            let stop = self.apply(report, false).await;

            if let Some(reason) = stop {
                return reason;
            }
            self.session.advance();

            if self.session.current_page <= self.limits.max_page {
                self.backoff.pause(DelayKind::Normal, &self.cancel).await;
            }
        }
    }

    async fn run_batched(&mut self) -> TerminationReason {
        let permits = Arc::new(Semaphore::new(self.limits.global_concurrency.max(1) as usize));
        let batch_size = self.limits.batch_size.max(1);

        loop {
            if let Some(reason) = self.stop_before_page() {
                return reason;
            }

            let first = self.session.current_page;
            let last = first
                .saturating_add(batch_size - 1)
                .min(self.limits.max_page);

            let mut tasks = JoinSet::new();
            for page in first..=last {
                let worker = self.worker.clone();
                let permits = Arc::clone(&permits);
                tasks.spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    worker.fetch_page(page).await
                });
            }

            let mut reports = Vec::with_capacity((last - first + 1) as usize);
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => tracing::warn!("Page task failed: {}", e),
                }
            }
            reports.sort_by_key(|report| report.page);

            // Every report is applied so fetched records are never dropped,
            // but no cooldown is slept once the batch has decided to stop
            let mut stop = None;
            for report in reports {
                if let Some(reason) = self.apply(report, stop.is_some()).await {
                    if reason != TerminationReason::MaxEmptyPagesReached && stop.is_none() {
                        stop = Some(reason);
                    }
                }
            }
            self.session.advance_to(last.saturating_add(1));

            tracing::info!(
                "Batch {}-{} done: {} records so far, {} empty in a row",
                first,
                last,
                self.session.records_persisted,
                self.session.consecutive_empty
            );

            let stop = stop.or_else(|| {
                (self.session.consecutive_empty >= self.limits.max_empty_pages)
                    .then_some(TerminationReason::MaxEmptyPagesReached)
            });
            if let Some(reason) = stop {
                return reason;
            }

            if self.session.current_page <= self.limits.max_page {
                self.backoff.pause(DelayKind::Normal, &self.cancel).await;
            }
        }
    }

    fn stop_before_page(&self) -> Option<TerminationReason> {
        if self.cancel.is_cancelled() {
            return Some(TerminationReason::UserCancelled);
        }
        if self.session.current_page > self.limits.max_page {
            return Some(TerminationReason::MaxPageLimitReached);
        }
        None
    }

    /// Applies one page report; returns a reason if the crawl must stop
    ///
    /// With `stopping` set the outcome is still counted but no cooldown runs.
    async fn apply(&mut self, report: PageReport, stopping: bool) -> Option<TerminationReason> {
        let page = report.page;
        self.session
            .record_requests(report.requests_ok, report.requests_failed);

        match report.result {
            PageResult::Fetched { body } => {
                let records = self.extractor.extract(&body);
                if records.is_empty() {
                    return self.page_empty(page);
                }

                let count = records.len();
                self.session.record_page_success(count);
                for mut record in records {
                    record.title.clone_from(&self.title);
                    match self.sink.append(&record) {
                        Ok(()) => self.session.record_persisted(),
                        Err(e) => {
                            tracing::warn!("Failed to persist review from page {}: {}", page, e);
                            self.session.record_persist_failure();
                        }
                    }
                }

                tracing::info!(
                    "Page {}: {} reviews ({} total)",
                    page,
                    count,
                    self.session.records_persisted
                );
                None
            }
            PageResult::Empty => self.page_empty(page),
            PageResult::Failed(class) => self.page_failed(page, class, stopping).await,
            PageResult::Cancelled => Some(TerminationReason::UserCancelled),
            PageResult::ProxyPoolExhausted => Some(TerminationReason::ProxyPoolExhausted),
        }
    }

    fn page_empty(&mut self, page: u32) -> Option<TerminationReason> {
        let empty = self.session.record_page_empty();
        tracing::info!(
            "Page {}: no reviews ({}/{} empty in a row)",
            page,
            empty,
            self.limits.max_empty_pages
        );

        // Batched mode evaluates the streak after the whole batch
        (empty >= self.limits.max_empty_pages).then_some(TerminationReason::MaxEmptyPagesReached)
    }

    async fn page_failed(
        &mut self,
        page: u32,
        class: FailureClass,
        stopping: bool,
    ) -> Option<TerminationReason> {
        let streak = self.session.record_page_failure(page, class);
        let threshold = match class {
            FailureClass::Blocked => self.limits.max_consecutive_blocks,
            FailureClass::Network => self.limits.max_consecutive_timeouts,
        };
        tracing::warn!(
            "Page {} skipped after retries ({:?}, {}/{} in a row)",
            page,
            class,
            streak,
            threshold
        );

        if streak < threshold {
            return None;
        }

        if class == FailureClass::Blocked
            && self.session.block_cooldowns >= self.limits.max_block_cooldowns
        {
            tracing::warn!(
                "Still blocked after {} cooldowns, giving up",
                self.session.block_cooldowns
            );
            return Some(TerminationReason::MaxBlockedReached);
        }

        if stopping {
            tracing::debug!("Crawl already stopping, skipping cooldown after page {}", page);
            return None;
        }

        self.session.record_cooldown(class);
        let delay = self.backoff.delay_for(DelayKind::LongCooldown);
        tracing::warn!(
            "{} consecutive {:?} pages, cooling down for {:.0}s",
            streak,
            class,
            delay.as_secs_f64()
        );
        self.backoff.sleep(delay, &self.cancel).await;
        None
    }

    fn report(&self, reason: TerminationReason) -> CrawlReport {
        let session = &self.session;
        let proxies = self
            .pool
            .as_ref()
            .map(|pool| lock_pool(pool).snapshot())
            .unwrap_or_default();

        CrawlReport {
            product_id: session.product_id.clone(),
            title: self.title.clone(),
            reason,
            pages_attempted: session.pages_attempted,
            pages_succeeded: session.pages_succeeded,
            pages_empty: session.pages_empty,
            pages_failed: session.pages_failed,
            failed_pages: session.failed_pages.clone(),
            last_page: session.current_page.saturating_sub(1),
            records_extracted: session.records_extracted,
            records_persisted: session.records_persisted,
            persist_failures: session.persist_failures,
            requests_ok: session.total_success,
            requests_failed: session.total_failure,
            cooldowns: session.cooldowns,
            elapsed: session.elapsed(),
            proxies,
        }
    }
}

/// Runs a complete crawl from configuration
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Resolve the product id
/// 2. Resolve the product title
/// 3. Build the proxy pool, if any proxies are configured
/// 4. Open the record sink (and the run log for SQLite output)
/// 5. Walk the listing until a termination condition fires
pub async fn run_crawl(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> crate::Result<CrawlReport> {
    let product_id = config.target.resolve_product_id()?;

    let extractor: Arc<dyn ExtractionAdapter> = Arc::new(ReviewCardExtractor::new());
    let fetcher = Arc::new(HttpPageFetcher::new(&config.target, Arc::clone(&extractor))?);

    let title = if config.output.resolve_title {
        let client = crate::crawler::fetcher::build_http_client(
            Timeouts::from_target(&config.target),
            config.target.accept_invalid_certs,
        )?;
        ProductPageTitleResolver::new(
            client,
            config.target.product_page_base.clone(),
            HeaderProfile::from_config(&config.headers),
            config.output.fallback_title.clone(),
        )
        .resolve_title(&product_id)
        .await
    } else {
        FixedTitle(config.output.fallback_title.clone())
            .resolve_title(&product_id)
            .await
    };

    let endpoints = proxies_from_config(&config.proxy)?;
    let pool = if endpoints.is_empty() {
        tracing::info!("No proxies configured, requests go direct");
        None
    } else {
        tracing::info!("Loaded {} proxies", endpoints.len());
        let policy = PoolPolicy::from_config(&config.proxy, &config.crawler);
        Some(ProxyPool::new(endpoints, policy).into_shared())
    };

    let mut run_log = None;
    let sink: Box<dyn RecordSink> = match config.output.format {
        OutputFormat::Csv => Box::new(CsvSink::create(
            Path::new(&config.output.directory),
            &title,
            config.output.flush_every,
        )?),
        OutputFormat::Sqlite => {
            let path = config.output.database_path();
            run_log = Some(RunLog::start(&path, &product_id, config_hash)?);
            tracing::info!("Writing reviews to {}", path.display());
            Box::new(SqliteSink::open(&path, &product_id, config.output.flush_every)?)
        }
    };

    let mut controller =
        PaginationController::new(config, product_id, title, fetcher, extractor, sink)
            .with_cancellation(cancel);
    if let Some(pool) = pool {
        controller = controller.with_proxy_pool(pool);
    }

    let report = controller.run().await;

    if let Some(log) = run_log {
        if let Err(e) = log.finish(&report) {
            tracing::warn!("Failed to record crawl run: {}", e);
        }
    }

    Ok(report)
}
