use crate::adapters::redis::RedisClient;
use crate::core::clock::Clock;
use crate::core::rate_limiter::{RateLimitPolicy, RateLimiter};
use async_trait::async_trait;
use std::sync::Arc;

// KEYS[1] window hash, ARGV: now (unix secs), window (secs), cap.
// Same algorithm as the in-memory limiter, evaluated atomically so every replica shares one count.
const ALLOW_SCRIPT: &str = r"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local cap = tonumber(ARGV[3])
local count = tonumber(redis.call('HGET', KEYS[1], 'count') or '0')
local last = tonumber(redis.call('HGET', KEYS[1], 'last') or ARGV[1])
if now - last > window then
  count = 0
end
if count >= cap then
  return 0
end
redis.call('HSET', KEYS[1], 'count', count + 1, 'last', now)
redis.call('EXPIRE', KEYS[1], window + 1)
return 1
";

#[derive(Debug)]
pub struct RedisRateLimiter {
    redis: Arc<RedisClient>,
    script: redis::Script,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl RedisRateLimiter {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { redis, script: redis::Script::new(ALLOW_SCRIPT), policy, clock }
    }

    fn window_key(&self, phone: &str) -> String {
        self.redis.key(&format!("ratelimit:{phone}"))
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    #[tracing::instrument(level = "debug", skip(self, phone), err)]
    async fn allow(&self, phone: &str) -> anyhow::Result<bool> {
        let mut conn = self.redis.connection();
        let allowed: i64 = self
            .script
            .key(self.window_key(phone))
            .arg(self.clock.now().unix_timestamp())
            .arg(self.policy.window.whole_seconds())
            .arg(self.policy.cap)
            .invoke_async(&mut conn)
            .await?;

        Ok(allowed == 1)
    }
}
