//! Request pacing
//!
//! Every pause is a uniform random draw from the range configured for its
//! kind. `delay_for` only computes; `sleep`/`pause` do the waiting and return
//! early when the crawl is cancelled.

use crate::config::{DelayConfig, DelayRange};
use crate::state::CancellationToken;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// What a pause is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayKind {
    /// Between pages
    Normal,
    /// Between attempts at the same page
    Retry,
    /// After repeated timeouts or blocks; minutes rather than seconds
    LongCooldown,
}

impl fmt::Display for DelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Normal => "normal",
            Self::Retry => "retry",
            Self::LongCooldown => "long cooldown",
        };
        write!(f, "{}", text)
    }
}

/// Jittered delay source keyed by [`DelayKind`]
#[derive(Debug, Clone)]
pub struct Backoff {
    delays: DelayConfig,
}

impl Backoff {
    pub fn new(delays: DelayConfig) -> Self {
        Self { delays }
    }

    pub fn range_for(&self, kind: DelayKind) -> DelayRange {
        match kind {
            DelayKind::Normal => self.delays.normal,
            DelayKind::Retry => self.delays.retry,
            DelayKind::LongCooldown => self.delays.long_cooldown,
        }
    }

    /// Uniform random duration within the range for `kind`
    pub fn delay_for(&self, kind: DelayKind) -> Duration {
        self.delay_with(kind, &mut rand::rng())
    }

    /// [`delay_for`](Self::delay_for) with a caller-supplied random source
    pub fn delay_with<R: Rng>(&self, kind: DelayKind, rng: &mut R) -> Duration {
        let range = self.range_for(kind);
        if range.max <= range.min {
            return secs_to_duration(range.min);
        }
        secs_to_duration(rng.random_range(range.min..=range.max))
    }

    /// Sleeps for `delay` unless cancelled first; returns false if cancelled
    pub async fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Draws a delay for `kind` and sleeps it; returns the drawn delay
    pub async fn pause(&self, kind: DelayKind, cancel: &CancellationToken) -> Duration {
        let delay = self.delay_for(kind);
        if !delay.is_zero() {
            tracing::debug!("Pausing {:.1}s ({})", delay.as_secs_f64(), kind);
        }
        self.sleep(delay, cancel).await;
        delay
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
