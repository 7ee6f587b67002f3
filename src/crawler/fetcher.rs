//! Review listing fetcher
//!
//! This module performs the HTTP request for one listing page and classifies
//! the response. It never returns an error: every result, including blocks
//! and transport failures, is a [`FetchOutcome`].
//!
//! # Classification
//!
//! | Response | Outcome |
//! |----------|---------|
//! | status in `blocked-statuses` | `Blocked{status}` |
//! | other non-2xx status | `NetworkError{Other}` |
//! | 2xx with review cards | `Success` |
//! | 2xx, no cards, body matches a block marker | `Blocked{status: 200}` |
//! | 2xx, no cards | `Empty` |
//! | timeout | `NetworkError{Timeout}` |
//! | connection refused/reset, proxy unreachable | `NetworkError{ConnectionFailed}` |
//! | anything else | `NetworkError{Other}` |

use crate::config::{SortKey, TargetConfig};
use crate::extract::ExtractionAdapter;
use crate::proxy::{client_for_proxy, ProxyEndpoint};
use crate::HarvestError;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// One listing page request
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub product_id: String,
    pub page: u32,
    pub page_size: u32,
    pub sort: SortKey,
    pub ratings: String,
    pub query: String,
    pub vi_role_code: u32,
    pub rating_summary: bool,

    /// Route through this proxy; `None` goes direct
    pub proxy: Option<ProxyEndpoint>,
}

impl PageRequest {
    pub fn new(target: &TargetConfig, product_id: &str, page: u32) -> Self {
        Self {
            product_id: product_id.to_string(),
            page,
            page_size: target.page_size,
            sort: target.sort_by,
            ratings: target.ratings.clone(),
            query: target.query.clone(),
            vi_role_code: target.vi_role_code,
            rating_summary: target.rating_summary,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyEndpoint>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Query string parameters understood by the listing endpoint
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("productId", self.product_id.clone()),
            ("page", self.page.to_string()),
            ("size", self.page_size.to_string()),
            ("sortBy", self.sort.as_query_value().to_string()),
            ("ratings", self.ratings.clone()),
            ("q", self.query.clone()),
            ("viRoleCode", self.vi_role_code.to_string()),
            ("ratingSummary", self.rating_summary.to_string()),
        ]
    }
}

/// Transport failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionFailed,
    Other,
}

/// Classified result of one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page carried at least one review card
    Success { body: String, elapsed: Duration },

    /// The remote service refused the request
    Blocked { status: u16 },

    /// A valid answer with no review cards
    Empty,

    /// The request did not produce a usable answer
    NetworkError { kind: NetworkErrorKind },
}

impl FetchOutcome {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Blocked { .. } => "blocked",
            Self::Empty => "empty",
            Self::NetworkError { .. } => "network error",
        }
    }
}

/// Connect and read timeouts for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Timeouts {
    pub fn from_target(target: &TargetConfig) -> Self {
        Self {
            connect: target.connect_timeout(),
            read: target.read_timeout(),
        }
    }

    /// Whole-request budget
    ///
    /// The client has no separate read deadline, so the read budget is
    /// applied on top of the connect budget.
    pub fn total(&self) -> Duration {
        self.connect + self.read
    }
}

/// Performs a single page request
///
/// Implementations must not touch proxy or session state; the caller acts on
/// the returned outcome.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        request: &PageRequest,
        headers: HeaderMap,
        timeouts: Timeouts,
    ) -> impl Future<Output = FetchOutcome> + Send;
}

/// Builds the client used for direct requests
pub fn build_http_client(
    timeouts: Timeouts,
    accept_invalid_certs: bool,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.total())
        .danger_accept_invalid_certs(accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`PageFetcher`] over reqwest
///
/// Keeps one client per proxy address so connection pools are reused across
/// pages routed through the same proxy.
pub struct HttpPageFetcher {
    endpoint: Url,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
    extractor: Arc<dyn ExtractionAdapter>,
    blocked_statuses: Vec<u16>,
    block_markers: Vec<String>,
    timeouts: Timeouts,
    accept_invalid_certs: bool,
}

impl HttpPageFetcher {
    pub fn new(
        target: &TargetConfig,
        extractor: Arc<dyn ExtractionAdapter>,
    ) -> Result<Self, HarvestError> {
        let endpoint = Url::parse(&target.endpoint)?;
        let timeouts = Timeouts::from_target(target);
        let direct = build_http_client(timeouts, target.accept_invalid_certs)?;

        Ok(Self {
            endpoint,
            direct,
            proxied: Mutex::new(HashMap::new()),
            extractor,
            blocked_statuses: target.blocked_statuses.clone(),
            block_markers: target
                .block_markers
                .iter()
                .map(|marker| marker.to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
            timeouts,
            accept_invalid_certs: target.accept_invalid_certs,
        })
    }

    /// Client for the request's route
    ///
    /// A proxy whose client cannot be built is reported as a connection
    /// failure so the caller rotates away from it.
    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Option<Client> {
        let Some(proxy) = proxy else {
            return Some(self.direct.clone());
        };

        let mut cache = self
            .proxied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = cache.get(&proxy.address()) {
            return Some(client.clone());
        }

        match client_for_proxy(
            proxy,
            self.timeouts.connect,
            self.timeouts.total(),
            self.accept_invalid_certs,
        ) {
            Ok(client) => {
                cache.insert(proxy.address(), client.clone());
                Some(client)
            }
            Err(e) => {
                tracing::warn!("Could not build client for proxy {}: {}", proxy, e);
                None
            }
        }
    }

    fn classify_body(&self, body: String, elapsed: Duration) -> FetchOutcome {
        if self.extractor.card_count(&body) > 0 {
            return FetchOutcome::Success { body, elapsed };
        }

        if !self.block_markers.is_empty() {
            let lowered = body.to_lowercase();
            if let Some(marker) = self
                .block_markers
                .iter()
                .find(|marker| lowered.contains(marker.as_str()))
            {
                tracing::debug!("Card-less page matched block marker {:?}", marker);
                return FetchOutcome::Blocked { status: 200 };
            }
        }

        FetchOutcome::Empty
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        request: &PageRequest,
        headers: HeaderMap,
        timeouts: Timeouts,
    ) -> FetchOutcome {
        let Some(client) = self.client_for(request.proxy.as_ref()) else {
            return FetchOutcome::NetworkError {
                kind: NetworkErrorKind::ConnectionFailed,
            };
        };

        let started = Instant::now();
        let result = client
            .get(self.endpoint.clone())
            .query(&request.query_pairs())
            .headers(headers)
            .timeout(timeouts.total())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => return network_error(&e, request),
        };

        let status = response.status();
        if self.blocked_statuses.contains(&status.as_u16()) {
            return FetchOutcome::Blocked {
                status: status.as_u16(),
            };
        }

        if !status.is_success() {
            tracing::debug!(
                "Page {} answered HTTP {}, treating as a network error",
                request.page,
                status.as_u16()
            );
            return FetchOutcome::NetworkError {
                kind: NetworkErrorKind::Other,
            };
        }

        match response.text().await {
            Ok(body) => self.classify_body(body, started.elapsed()),
            Err(e) => network_error(&e, request),
        }
    }
}

fn network_error(error: &reqwest::Error, request: &PageRequest) -> FetchOutcome {
    let kind = if error.is_timeout() {
        NetworkErrorKind::Timeout
    } else if error.is_connect() {
        NetworkErrorKind::ConnectionFailed
    } else {
        NetworkErrorKind::Other
    };

    tracing::debug!("Page {} request failed ({:?}): {}", request.page, kind, error);
    FetchOutcome::NetworkError { kind }
}
