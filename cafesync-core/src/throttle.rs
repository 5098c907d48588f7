//! Minimum-spacing throttle for calls to rate-limited services.
//!
//! Wraps a `governor` direct rate limiter with a burst of one, so two
//! consecutive [`Throttle::wait`] calls are always at least `interval`
//! apart. Injected into the extractor and geocoder clients.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

pub struct Throttle {
    interval: Duration,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Throttle {
    /// Throttle allowing one call per `interval`. A zero interval disables it.
    pub fn every(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval)
            .map(|q| q.allow_burst(NonZeroU32::MIN))
            .map(RateLimiter::direct);
        Self { interval, limiter }
    }

    pub fn unlimited() -> Self {
        Self {
            interval: Duration::ZERO,
            limiter: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next call is permitted.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
