//! Per-client request limiting
//!
//! Counters live in the same key-value store as pastes, under
//! `rate_limit:<client>`, with the window length as their TTL. The first
//! request of a window creates the counter, so windows are fixed rather
//! than sliding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cinder_storage::KvStore;
use tracing::debug;

use crate::error::PasteResult;

/// Prefix of every rate-limit counter key
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit:";

/// Limits for [`KvRateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Verdict for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u64 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Decides whether a client may make another request
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request from `client` and return the verdict
    async fn check(&self, client: &str) -> PasteResult<RateDecision>;
}

/// Fixed-window limiter backed by [`KvStore::increment`]
pub struct KvRateLimiter {
    store: Arc<dyn KvStore>,
    config: RateLimitConfig,
}

impl KvRateLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

#[async_trait]
impl RateLimiter for KvRateLimiter {
    async fn check(&self, client: &str) -> PasteResult<RateDecision> {
        let key = format!("{}{}", RATE_LIMIT_KEY_PREFIX, client);
        let count = self.store.increment(&key, Some(self.config.window)).await?;

        if count > self.config.max_requests {
            debug!(client, count, "Rate limit exceeded");
            return Ok(RateDecision::Limited {
                retry_after: self.config.window,
            });
        }

        Ok(RateDecision::Allowed {
            remaining: self.config.max_requests - count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::ManualClock;
    use cinder_storage::InMemoryKvStore;

    fn limiter(max_requests: u64) -> (KvRateLimiter, ManualClock) {
        let clock = ManualClock::new(0);
        let store = Arc::new(InMemoryKvStore::with_clock(Arc::new(clock.clone())));
        let config = RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        };
        (KvRateLimiter::new(store, config), clock)
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let (limiter, _) = limiter(10);
        for i in 0..10 {
            let decision = limiter.check("203.0.113.7").await.unwrap();
            assert_eq!(decision, RateDecision::Allowed { remaining: 9 - i });
        }
        assert!(!limiter.check("203.0.113.7").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let (limiter, _) = limiter(1);
        assert!(limiter.check("a").await.unwrap().is_allowed());
        assert!(!limiter.check("a").await.unwrap().is_allowed());
        assert!(limiter.check("b").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_window_resets() {
        let (limiter, clock) = limiter(1);
        assert!(limiter.check("a").await.unwrap().is_allowed());
        assert_eq!(
            limiter.check("a").await.unwrap(),
            RateDecision::Limited {
                retry_after: Duration::from_secs(60)
            }
        );

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check("a").await.unwrap().is_allowed());
    }
}
