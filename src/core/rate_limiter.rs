use crate::core::clock::Clock;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// Per-recipient send throttling, consulted once before every transport call.
#[async_trait]
pub trait RateLimiter: Send + Sync + std::fmt::Debug {
    /// Records a send to `phone` and returns whether it is allowed.
    ///
    /// # Errors
    /// Returns an error if the backing counter store is unreachable.
    async fn allow(&self, phone: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub cap: u32,
    pub window: time::Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub fn new(cap: u32, window_secs: u64) -> Self {
        Self { cap, window: time::Duration::seconds(i64::try_from(window_secs).unwrap_or(i64::MAX)) }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(50, 3600)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    last_sent: OffsetDateTime,
}

/// Process-local limiter. Each instance keeps its own counts, so with several replicas the
/// effective cap is multiplied by the replica count.
#[derive(Debug)]
pub struct InMemoryRateLimiter {
    windows: DashMap<String, RateWindow>,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { windows: DashMap::new(), policy, clock }
    }

    /// Current count for `phone`, if it has ever been sent to.
    #[must_use]
    pub fn count(&self, phone: &str) -> Option<u32> {
        self.windows.get(phone).map(|w| w.count)
    }

    fn check_and_record(&self, phone: &str) -> bool {
        let now = self.clock.now();
        let mut window = self.windows.entry(phone.to_string()).or_insert(RateWindow { count: 0, last_sent: now });

        if now - window.last_sent > self.policy.window {
            window.count = 0;
        }

        if window.count >= self.policy.cap {
            return false;
        }

        window.count += 1;
        window.last_sent = now;
        true
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn allow(&self, phone: &str) -> anyhow::Result<bool> {
        Ok(self.check_and_record(phone))
    }
}
