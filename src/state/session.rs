use std::time::{Duration, Instant};

/// Class of a page that could not be fetched within its retry budget
///
/// Each class has its own consecutive counter and cooldown threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The remote service refused us (403/429/503/504 or a block marker)
    Blocked,
    /// Timeouts, refused connections and other transport failures
    Network,
}

/// Mutable state of one crawl
///
/// Created when a crawl starts and dropped when it ends; nothing here is
/// persisted. The controller owns it exclusively.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    /// Product being crawled
    pub product_id: String,

    /// Next page to request
    pub current_page: u32,

    /// Pages in a row that yielded no review cards
    pub consecutive_empty: u32,

    /// Pages in a row that ended blocked
    pub consecutive_blocked: u32,

    /// Pages in a row that ended in a network failure
    pub consecutive_timeouts: u32,

    /// Block cooldowns taken since the last page that was not blocked
    pub block_cooldowns: u32,

    /// Requests that got a usable answer (records or a genuine empty page)
    pub total_success: u64,

    /// Requests that were blocked or failed in transport
    pub total_failure: u64,

    pub pages_attempted: u32,
    pub pages_succeeded: u32,
    pub pages_empty: u32,
    pub pages_failed: u32,

    /// Pages given up on, in the order they were given up
    pub failed_pages: Vec<u32>,

    pub records_extracted: u64,
    pub records_persisted: u64,
    pub persist_failures: u64,

    /// Long cooldowns taken, any class
    pub cooldowns: u32,

    started_at: Instant,
}

impl CrawlSession {
    /// Creates a session starting at page 1
    pub fn new(product_id: impl Into<String>) -> Self {
        Self::starting_at(product_id, 1)
    }

    pub fn starting_at(product_id: impl Into<String>, first_page: u32) -> Self {
        Self {
            product_id: product_id.into(),
            current_page: first_page.max(1),
            consecutive_empty: 0,
            consecutive_blocked: 0,
            consecutive_timeouts: 0,
            block_cooldowns: 0,
            total_success: 0,
            total_failure: 0,
            pages_attempted: 0,
            pages_succeeded: 0,
            pages_empty: 0,
            pages_failed: 0,
            failed_pages: Vec::new(),
            records_extracted: 0,
            records_persisted: 0,
            persist_failures: 0,
            cooldowns: 0,
            started_at: Instant::now(),
        }
    }

    /// Moves to the next page
    pub fn advance(&mut self) {
        self.current_page = self.current_page.saturating_add(1);
    }

    /// Moves to `page`; the page counter never goes backwards
    pub fn advance_to(&mut self, page: u32) {
        self.current_page = self.current_page.max(page);
    }

    /// Adds request-level counts reported by the page worker
    pub fn record_requests(&mut self, succeeded: u32, failed: u32) {
        self.total_success += u64::from(succeeded);
        self.total_failure += u64::from(failed);
    }

    /// A page yielded `records` review cards
    pub fn record_page_success(&mut self, records: usize) {
        self.pages_attempted += 1;
        self.pages_succeeded += 1;
        self.records_extracted += records as u64;
        self.consecutive_empty = 0;
        self.clear_failure_streaks();
    }

    /// A page was answered but had no review cards
    ///
    /// Returns the new consecutive-empty count.
    pub fn record_page_empty(&mut self) -> u32 {
        self.pages_attempted += 1;
        self.pages_empty += 1;
        self.consecutive_empty += 1;
        self.clear_failure_streaks();
        self.consecutive_empty
    }

    /// A page exhausted its retries
    ///
    /// Returns the new consecutive count for `class`.
    pub fn record_page_failure(&mut self, page: u32, class: FailureClass) -> u32 {
        self.pages_attempted += 1;
        self.pages_failed += 1;
        self.failed_pages.push(page);
        match class {
            FailureClass::Blocked => {
                self.consecutive_blocked += 1;
                self.consecutive_blocked
            }
            FailureClass::Network => {
                self.consecutive_timeouts += 1;
                self.consecutive_timeouts
            }
        }
    }

    /// Current consecutive count for `class`
    pub fn consecutive_failures(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Blocked => self.consecutive_blocked,
            FailureClass::Network => self.consecutive_timeouts,
        }
    }

    /// Records a long cooldown for `class` and resets that class's counter
    pub fn record_cooldown(&mut self, class: FailureClass) {
        self.cooldowns += 1;
        match class {
            FailureClass::Blocked => {
                self.consecutive_blocked = 0;
                self.block_cooldowns += 1;
            }
            FailureClass::Network => self.consecutive_timeouts = 0,
        }
    }

    pub fn record_persisted(&mut self) {
        self.records_persisted += 1;
    }

    pub fn record_persist_failure(&mut self) {
        self.persist_failures += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn clear_failure_streaks(&mut self) {
        self.consecutive_blocked = 0;
        self.consecutive_timeouts = 0;
        self.block_cooldowns = 0;
    }
}
