//! Proxy pool with performance-weighted selection and quarantine
//!
//! # Handle lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | `acquire` | weighted pick among available handles, `in_flight += 1` |
//! | `release` | `in_flight -= 1` |
//! | `record_success` | success count and latency total updated |
//! | `record_failure` | failure count updated, may quarantine |
//! | quarantined fraction > reset fraction | next `acquire` clears the quarantine set |

use crate::config::{CrawlerConfig, ProxyConfig};
use crate::proxy::ProxyEndpoint;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Pool shared between concurrent page workers
pub type SharedProxyPool = Arc<Mutex<ProxyPool>>;

/// Locks a shared pool
///
/// Pool methods never panic halfway through an update, so a poisoned lock
/// still guards consistent data.
pub fn lock_pool(pool: &Mutex<ProxyPool>) -> MutexGuard<'_, ProxyPool> {
    pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Latency at or below which a proxy gets the full speed score
const FAST_LATENCY_SECS: f64 = 3.0;

/// Quarantine and concurrency policy
#[derive(Debug, Clone)]
pub struct PoolPolicy {
    /// Failures after which a handle with a poor success rate is quarantined
    pub quarantine_failures: u32,

    /// Success rate below which `quarantine_failures` applies
    pub min_success_rate: f64,

    /// Failures after which a handle is quarantined regardless of its rate
    pub hard_failures: u32,

    /// Quarantined fraction above which the quarantine set is cleared
    pub reset_fraction: f64,

    /// Concurrent leases allowed per handle
    pub per_proxy_concurrency: u32,
}

impl PoolPolicy {
    pub fn from_config(proxy: &ProxyConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            quarantine_failures: proxy.quarantine_failures,
            min_success_rate: proxy.quarantine_min_success_rate,
            hard_failures: proxy.quarantine_hard_failures,
            reset_fraction: proxy.reset_fraction,
            per_proxy_concurrency: crawler.per_proxy_concurrency,
        }
    }
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            quarantine_failures: 3,
            min_success_rate: 0.5,
            hard_failures: 5,
            reset_fraction: 0.7,
            per_proxy_concurrency: 1,
        }
    }
}

/// One proxy and its track record, owned by the pool
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    endpoint: ProxyEndpoint,
    success_count: u32,
    failure_count: u32,
    total_latency: Duration,
    last_used: Option<Instant>,
    quarantined: bool,
    in_flight: u32,
}

impl ProxyHandle {
    pub fn new(endpoint: ProxyEndpoint) -> Self {
        Self::with_history(endpoint, 0, 0, Duration::ZERO)
    }

    /// Creates a handle with an existing track record
    ///
    /// `total_latency` is the sum of latencies over `successes` requests.
    pub fn with_history(
        endpoint: ProxyEndpoint,
        successes: u32,
        failures: u32,
        total_latency: Duration,
    ) -> Self {
        Self {
            endpoint,
            success_count: successes,
            failure_count: failures,
            total_latency,
            last_used: None,
            quarantined: false,
            in_flight: 0,
        }
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_used(&self) -> Option<Instant> {
        self.last_used
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined
    }

    /// Share of successful requests; 0.5 for an untried proxy
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.5
        } else {
            f64::from(self.success_count) / f64::from(total)
        }
    }

    pub fn average_latency(&self) -> Option<Duration> {
        if self.success_count == 0 {
            None
        } else {
            Some(self.total_latency / self.success_count)
        }
    }

    /// `0.7 * success_rate + 0.3 * normalized_inverse_latency`
    ///
    /// Without latency data the score is the success rate alone. Always a
    /// finite value in `[0, 1]`.
    pub fn performance_score(&self) -> f64 {
        let rate = self.success_rate();
        let score = match self.average_latency() {
            None => rate,
            Some(latency) => {
                let secs = latency.as_secs_f64().max(0.1);
                let speed = (FAST_LATENCY_SECS / secs).min(1.0);
                0.7 * rate + 0.3 * speed
            }
        };

        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn is_selectable(&self, per_proxy_concurrency: u32) -> bool {
        !self.quarantined && self.in_flight < per_proxy_concurrency
    }

    fn should_quarantine(&self, policy: &PoolPolicy) -> bool {
        (self.failure_count >= policy.quarantine_failures
            && self.success_rate() < policy.min_success_rate)
            || self.failure_count >= policy.hard_failures
    }
}

/// A proxy checked out for one request
///
/// Hand it back with [`ProxyPool::release`] once the outcome is recorded.
#[derive(Debug, Clone)]
pub struct ProxyLease {
    index: usize,
    endpoint: ProxyEndpoint,
}

impl ProxyLease {
    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }
}

/// Read-only view of a handle for reporting
#[derive(Debug, Clone)]
pub struct ProxySnapshot {
    pub address: String,
    pub successes: u32,
    pub failures: u32,
    pub average_latency: Option<Duration>,
    pub score: f64,
    pub quarantined: bool,
}

/// Set of proxies with their statistics
#[derive(Debug, Clone)]
pub struct ProxyPool {
    handles: Vec<ProxyHandle>,
    policy: PoolPolicy,
    resets: u32,
}

impl ProxyPool {
    /// Creates a pool; duplicate addresses are dropped
    pub fn new(endpoints: Vec<ProxyEndpoint>, policy: PoolPolicy) -> Self {
        let mut seen = HashSet::new();
        let handles = endpoints
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.address()))
            .map(ProxyHandle::new)
            .collect();
        Self::from_handles(handles, policy)
    }

    pub fn from_handles(handles: Vec<ProxyHandle>, policy: PoolPolicy) -> Self {
        Self {
            handles,
            policy,
            resets: 0,
        }
    }

    pub fn into_shared(self) -> SharedProxyPool {
        Arc::new(Mutex::new(self))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn policy(&self) -> &PoolPolicy {
        &self.policy
    }

    pub fn handles(&self) -> &[ProxyHandle] {
        &self.handles
    }

    pub fn quarantined_count(&self) -> usize {
        self.handles.iter().filter(|h| h.quarantined).count()
    }

    /// Quarantined share of the pool; 0.0 for an empty pool
    pub fn quarantined_fraction(&self) -> f64 {
        if self.handles.is_empty() {
            0.0
        } else {
            self.quarantined_count() as f64 / self.handles.len() as f64
        }
    }

    /// Handles that could be leased right now
    pub fn available_count(&self) -> usize {
        let cap = self.policy.per_proxy_concurrency;
        self.handles.iter().filter(|h| h.is_selectable(cap)).count()
    }

    /// Leases currently checked out
    pub fn in_flight_count(&self) -> u32 {
        self.handles.iter().map(|h| h.in_flight).sum()
    }

    /// Number of full quarantine resets so far
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Leases a proxy, weighted by performance score
    pub fn acquire(&mut self) -> Option<ProxyLease> {
        self.acquire_with(&mut rand::rng())
    }

    /// [`acquire`](Self::acquire) with a caller-supplied random source
    pub fn acquire_with<R: Rng>(&mut self, rng: &mut R) -> Option<ProxyLease> {
        if self.handles.is_empty() {
            return None;
        }

        if self.quarantined_fraction() > self.policy.reset_fraction {
            self.reset_quarantine();
        }

        let cap = self.policy.per_proxy_concurrency;
        let candidates: Vec<usize> = (0..self.handles.len())
            .filter(|&i| self.handles[i].is_selectable(cap))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|&i| self.handles[i].performance_score())
            .collect();
        let total: f64 = weights.iter().sum();

        let chosen = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut pick = candidates[candidates.len() - 1];
            for (&index, &weight) in candidates.iter().zip(&weights) {
                if target < weight {
                    pick = index;
                    break;
                }
                target -= weight;
            }
            pick
        } else {
            candidates[rng.random_range(0..candidates.len())]
        };

        let handle = &mut self.handles[chosen];
        handle.in_flight += 1;
        handle.last_used = Some(Instant::now());

        Some(ProxyLease {
            index: chosen,
            endpoint: handle.endpoint.clone(),
        })
    }

    /// Returns a lease to the pool
    pub fn release(&mut self, lease: ProxyLease) {
        if let Some(handle) = self.handles.get_mut(lease.index) {
            handle.in_flight = handle.in_flight.saturating_sub(1);
        }
    }

    pub fn record_success(&mut self, lease: &ProxyLease, elapsed: Duration) {
        if let Some(handle) = self.handles.get_mut(lease.index) {
            handle.success_count += 1;
            handle.total_latency += elapsed;
        }
    }

    /// Counts a failure; returns true if this call quarantined the handle
    pub fn record_failure(&mut self, lease: &ProxyLease) -> bool {
        let policy = &self.policy;
        let Some(handle) = self.handles.get_mut(lease.index) else {
            return false;
        };

        handle.failure_count += 1;
        if handle.quarantined || !handle.should_quarantine(policy) {
            return false;
        }

        handle.quarantined = true;
        tracing::warn!(
            "Proxy {} quarantined ({} failures, success rate {:.0}%)",
            handle.endpoint,
            handle.failure_count,
            handle.success_rate() * 100.0
        );
        true
    }

    /// Clears every quarantine and the failure counts of quarantined handles
    pub fn reset_quarantine(&mut self) {
        let mut cleared = 0;
        for handle in self.handles.iter_mut().filter(|h| h.quarantined) {
            handle.quarantined = false;
            handle.failure_count = 0;
            cleared += 1;
        }
        self.resets += 1;
        tracing::info!(
            "Proxy quarantine reset: {} of {} proxies back in rotation",
            cleared,
            self.handles.len()
        );
    }

    pub fn snapshot(&self) -> Vec<ProxySnapshot> {
        self.handles
            .iter()
            .map(|h| ProxySnapshot {
                address: h.endpoint.address(),
                successes: h.success_count,
                failures: h.failure_count,
                average_latency: h.average_latency(),
                score: h.performance_score(),
                quarantined: h.quarantined,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn endpoints(n: usize) -> Vec<ProxyEndpoint> {
        (0..n)
            .map(|i| ProxyEndpoint::new(format!("10.0.0.{}", i + 1), 8080))
            .collect()
    }

    fn lease(pool: &ProxyPool, index: usize) -> ProxyLease {
        ProxyLease {
            index,
            endpoint: pool.handles[index].endpoint.clone(),
        }
    }

    fn quarantine(pool: &mut ProxyPool, index: usize) {
        let lease = lease(pool, index);
        while !pool.handles[index].quarantined {
            pool.record_failure(&lease);
        }
    }

    #[test]
    fn test_empty_pool_yields_nothing() {
        let mut pool = ProxyPool::new(vec![], PoolPolicy::default());
        assert!(pool.is_empty());
        assert!(pool.acquire().is_none());
        assert_eq!(pool.quarantined_fraction(), 0.0);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut list = endpoints(2);
        list.push(ProxyEndpoint::new("10.0.0.1", 8080));
        let pool = ProxyPool::new(list, PoolPolicy::default());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_untried_score_is_half() {
        let handle = ProxyHandle::new(ProxyEndpoint::new("h", 1));
        assert_eq!(handle.success_rate(), 0.5);
        assert_eq!(handle.performance_score(), 0.5);
    }

    #[test]
    fn test_score_combines_rate_and_speed() {
        let fast = ProxyHandle::with_history(
            ProxyEndpoint::new("a", 1),
            10,
            0,
            Duration::from_secs(10),
        );
        assert!((fast.performance_score() - 1.0).abs() < 1e-9);

        // 6s average latency halves the speed component
        let slow = ProxyHandle::with_history(
            ProxyEndpoint::new("b", 1),
            1,
            1,
            Duration::from_secs(6),
        );
        assert!((slow.performance_score() - (0.7 * 0.5 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_score_never_negative_or_nan() {
        let mut pool = ProxyPool::new(endpoints(1), PoolPolicy::default());
        let l = lease(&pool, 0);
        for _ in 0..20 {
            pool.record_success(&l, Duration::ZERO);
            pool.record_failure(&l);
            let score = pool.handles[0].performance_score();
            assert!(score.is_finite());
            assert!(score >= 0.0);
        }

        let zero = ProxyHandle::with_history(ProxyEndpoint::new("z", 1), 0, 50, Duration::ZERO);
        assert_eq!(zero.performance_score(), 0.0);
    }

    #[test]
    fn test_quarantine_on_poor_rate() {
        let mut pool = ProxyPool::new(endpoints(1), PoolPolicy::default());
        let l = lease(&pool, 0);
        assert!(!pool.record_failure(&l));
        assert!(!pool.record_failure(&l));
        assert!(pool.record_failure(&l));
        assert!(pool.handles[0].is_quarantined());
    }

    #[test]
    fn test_good_rate_survives_until_hard_limit() {
        let mut pool = ProxyPool::new(endpoints(1), PoolPolicy::default());
        let l = lease(&pool, 0);
        for _ in 0..10 {
            pool.record_success(&l, Duration::from_secs(1));
        }
        for _ in 0..4 {
            assert!(!pool.record_failure(&l));
        }
        assert!(pool.record_failure(&l));
        assert_eq!(pool.handles[0].failure_count(), 5);
    }

    #[test]
    fn test_never_returns_quarantined_at_or_below_reset_fraction() {
        let mut pool = ProxyPool::new(endpoints(10), PoolPolicy::default());
        for i in 0..7 {
            quarantine(&mut pool, i);
        }
        assert!((pool.quarantined_fraction() - 0.7).abs() < 1e-9);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let l = pool.acquire_with(&mut rng).unwrap();
            assert!(!pool.handles[l.index].is_quarantined());
            pool.release(l);
        }
        assert_eq!(pool.resets(), 0);
    }

    #[test]
    fn test_reset_after_fraction_exceeded() {
        let mut pool = ProxyPool::new(endpoints(10), PoolPolicy::default());
        for i in 0..8 {
            quarantine(&mut pool, i);
        }
        assert!(pool.quarantined_fraction() > 0.7);

        let l = pool.acquire().unwrap();
        assert_eq!(pool.quarantined_count(), 0);
        assert_eq!(pool.resets(), 1);
        assert_eq!(pool.handles[0].failure_count(), 0);
        pool.release(l);
    }

    #[test]
    fn test_per_proxy_concurrency_cap() {
        let mut pool = ProxyPool::new(endpoints(2), PoolPolicy::default());
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.index, b.index);
        assert!(pool.acquire().is_none());
        assert_eq!(pool.available_count(), 0);
        assert_eq!(pool.in_flight_count(), 2);

        pool.release(a);
        assert_eq!(pool.available_count(), 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn test_weighted_selection_prefers_better_proxy() {
        // Scores of roughly 0.9 and 0.1
        let good = ProxyHandle::with_history(
            ProxyEndpoint::new("good", 1),
            9,
            1,
            Duration::from_secs(30),
        );
        let bad = ProxyHandle::with_history(
            ProxyEndpoint::new("bad", 1),
            1,
            9,
            Duration::from_secs(30),
        );
        assert!((good.performance_score() - 0.9).abs() < 0.05);
        assert!((bad.performance_score() - 0.1).abs() < 0.05);

        let mut pool = ProxyPool::from_handles(vec![good, bad], PoolPolicy::default());
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 10_000;
        let mut good_picks = 0;
        for _ in 0..draws {
            let l = pool.acquire_with(&mut rng).unwrap();
            if l.endpoint().host() == "good" {
                good_picks += 1;
            }
            pool.release(l);
        }

        // Expected share is about 0.9; anything above 0.8 is far beyond chance
        assert!(good_picks > draws * 8 / 10, "good picked {} times", good_picks);
    }

    #[test]
    fn test_uniform_fallback_when_all_scores_zero() {
        let handles = (0..2)
            .map(|i| {
                ProxyHandle::with_history(
                    ProxyEndpoint::new(format!("z{}", i), 1),
                    0,
                    1,
                    Duration::ZERO,
                )
            })
            .collect();
        let policy = PoolPolicy {
            hard_failures: 100,
            quarantine_failures: 100,
            ..PoolPolicy::default()
        };
        let mut pool = ProxyPool::from_handles(handles, policy);
        let mut rng = StdRng::seed_from_u64(1);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let l = pool.acquire_with(&mut rng).unwrap();
            seen.insert(l.index);
            pool.release(l);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_snapshot_reports_stats() {
        let mut pool = ProxyPool::new(endpoints(1), PoolPolicy::default());
        let l = lease(&pool, 0);
        pool.record_success(&l, Duration::from_secs(2));
        pool.record_failure(&l);

        let snap = pool.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].address, "10.0.0.1:8080");
        assert_eq!(snap[0].successes, 1);
        assert_eq!(snap[0].failures, 1);
        assert_eq!(snap[0].average_latency, Some(Duration::from_secs(2)));
        assert!(!snap[0].quarantined);
    }
}
