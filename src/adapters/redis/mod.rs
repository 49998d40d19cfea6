use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod rate_limiter;
pub mod status_queue;

pub use rate_limiter::RedisRateLimiter;
pub use status_queue::RedisStatusQueue;

#[derive(Debug)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff while the server is unreachable.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every connection attempt fails.
    pub async fn connect(url: &str, key_prefix: &str) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(url)?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(5);

        let connection = (|| {
            let client = client.clone();
            async move { client.get_connection_manager().await }
        })
        .retry(retry_strategy)
        .notify(|e, duration| {
            tracing::warn!(error = %e, retry_in = ?duration, "Redis connection failed, retrying...");
        })
        .await?;

        tracing::info!("Connected to Redis");
        Ok(Arc::new(Self { connection, key_prefix: key_prefix.to_string() }))
    }

    /// Returns a cheap clone of the shared multiplexed connection.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }

    #[must_use]
    pub fn key(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.key_prefix)
    }

    /// Pings the Redis server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
