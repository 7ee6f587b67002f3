/// Termination reasons and controller state
///
/// A crawl is `Running` until exactly one termination condition fires.
use std::fmt;

/// Why a crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// Enough consecutive empty pages to call it the end of the listing
    MaxEmptyPagesReached,

    /// Repeated block cooldowns did not help
    MaxBlockedReached,

    /// Page counter passed the configured ceiling
    MaxPageLimitReached,

    /// The operator interrupted the crawl
    UserCancelled,

    /// No proxy could be acquired and direct requests are not allowed
    ProxyPoolExhausted,
}

impl TerminationReason {
    /// Returns true if the listing was walked to its end
    pub fn is_natural_end(&self) -> bool {
        matches!(self, Self::MaxEmptyPagesReached | Self::MaxPageLimitReached)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::MaxEmptyPagesReached => "max_empty_pages_reached",
            Self::MaxBlockedReached => "max_blocked_reached",
            Self::MaxPageLimitReached => "max_page_limit_reached",
            Self::UserCancelled => "user_cancelled",
            Self::ProxyPoolExhausted => "proxy_pool_exhausted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "max_empty_pages_reached" => Some(Self::MaxEmptyPagesReached),
            "max_blocked_reached" => Some(Self::MaxBlockedReached),
            "max_page_limit_reached" => Some(Self::MaxPageLimitReached),
            "user_cancelled" => Some(Self::UserCancelled),
            "proxy_pool_exhausted" => Some(Self::ProxyPoolExhausted),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MaxEmptyPagesReached => "no more reviews (consecutive empty pages)",
            Self::MaxBlockedReached => "blocked by the remote service",
            Self::MaxPageLimitReached => "page ceiling reached",
            Self::UserCancelled => "cancelled by user",
            Self::ProxyPoolExhausted => "proxy pool exhausted",
        };
        write!(f, "{}", text)
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Running,
    Terminated(TerminationReason),
}

impl CrawlState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn reason(&self) -> Option<TerminationReason> {
        match self {
            Self::Running => None,
            Self::Terminated(reason) => Some(*reason),
        }
    }
}
