use crate::adapters::redis::RedisClient;
use crate::core::status_queue::{StatusCheckJob, StatusCheckQueue};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use time::OffsetDateTime;

/// Status checks kept in a sorted set scored by due time in Unix milliseconds, so pending checks survive restarts
/// and are shared between replicas.
#[derive(Debug, Clone)]
pub struct RedisStatusQueue {
    redis: Arc<RedisClient>,
    queue_key: String,
}

impl RedisStatusQueue {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, queue_key: &str) -> Self {
        let queue_key = redis.key(queue_key);
        Self { redis, queue_key }
    }
}

fn due_score(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

#[async_trait]
impl StatusCheckQueue for RedisStatusQueue {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn schedule(&self, job: StatusCheckJob, run_at: OffsetDateTime) -> anyhow::Result<()> {
        let member = serde_json::to_string(&job)?;
        let mut conn = self.redis.connection();
        let _: i64 = conn.zadd(&self.queue_key, member, due_score(run_at)).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn claim_due(&self, now: OffsetDateTime, limit: usize) -> anyhow::Result<Vec<StatusCheckJob>> {
        let mut conn = self.redis.connection();
        let limit = isize::try_from(limit).unwrap_or(isize::MAX);

        let candidates: Vec<String> =
            conn.zrangebyscore_limit(&self.queue_key, "-inf", due_score(now), 0, limit).await?;

        let mut claimed = Vec::with_capacity(candidates.len());

        for member in candidates {
            // ZREM returns 1 only for the replica that actually removed the member.
            match conn.zrem::<_, _, i64>(&self.queue_key, &member).await {
                Ok(1) => match serde_json::from_str::<StatusCheckJob>(&member) {
                    Ok(job) => claimed.push(job),
                    Err(e) => tracing::error!(error = %e, member = %member, "Dropping malformed status check job"),
                },
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Failed to claim status check job"),
            }
        }

        Ok(claimed)
    }
}
