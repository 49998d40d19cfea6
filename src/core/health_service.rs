use crate::adapters::redis::RedisClient;
use crate::core::message_store::MessageStore;
use opentelemetry::{KeyValue, global, metrics::Histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[derive(Clone, Debug)]
struct Metrics {
    check_duration_seconds: Histogram<f64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("sms-notifier");
        Self {
            check_duration_seconds: meter
                .f64_histogram("health_check_duration_seconds")
                .with_description("Duration of readiness checks")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn MessageStore>,
    redis: Option<Arc<RedisClient>>,
    check_timeout: Duration,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, redis: Option<Arc<RedisClient>>, check_timeout: Duration) -> Self {
        Self { store, redis, check_timeout, metrics: Metrics::new() }
    }

    /// # Errors
    /// Returns a description of the failure if the message store is unreachable or slow.
    pub async fn check_store(&self) -> Result<(), String> {
        let start = Instant::now();

        let res = match timeout(self.check_timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Message store check failed: {e}")),
            Err(_) => Err("Message store check timed out".to_string()),
        };

        self.metrics.check_duration_seconds.record(start.elapsed().as_secs_f64(), &[KeyValue::new("component", "store")]);
        res
    }

    /// Succeeds trivially when no Redis is configured.
    ///
    /// # Errors
    /// Returns a description of the failure if Redis is unreachable or slow.
    pub async fn check_redis(&self) -> Result<(), String> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };
        let start = Instant::now();

        let res = match timeout(self.check_timeout, redis.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Redis check failed: {e}")),
            Err(_) => Err("Redis check timed out".to_string()),
        };

        self.metrics.check_duration_seconds.record(start.elapsed().as_secs_f64(), &[KeyValue::new("component", "redis")]);
        res
    }
}
