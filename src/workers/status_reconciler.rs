use crate::config::StatusCheckConfig;
use crate::core::clock::Clock;
use crate::core::dispatcher::{DispatchError, NotificationDispatcher};
use crate::core::status_queue::{StatusCheckJob, StatusCheckQueue};
use backon::{BackoffBuilder, ExponentialBuilder};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    checks: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("sms-notifier");
        Self {
            checks: meter
                .u64_counter("sms_status_checks_total")
                .with_description("Delivery status checks by outcome")
                .build(),
        }
    }
}

/// Drains the status check queue, refreshing stored delivery statuses and retrying failed
/// lookups with exponential backoff.
#[derive(Debug)]
pub struct StatusReconcilerWorker {
    dispatcher: NotificationDispatcher,
    queue: Arc<dyn StatusCheckQueue>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    max_attempts: u32,
    backoff: ExponentialBuilder,
    semaphore: Arc<Semaphore>,
    metrics: Metrics,
}

impl StatusReconcilerWorker {
    #[must_use]
    pub fn new(
        dispatcher: NotificationDispatcher,
        queue: Arc<dyn StatusCheckQueue>,
        clock: Arc<dyn Clock>,
        config: &StatusCheckConfig,
    ) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(config.max_backoff_secs.max(config.min_backoff_secs)))
            .with_max_times(config.max_attempts as usize);

        Self {
            dispatcher,
            queue,
            clock,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            max_attempts: config.max_attempts.max(1),
            backoff,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            metrics: Metrics::new(),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        let mut in_flight = JoinSet::new();

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_due_jobs(&mut in_flight)
                        .instrument(tracing::debug_span!("status_reconciler_iteration"))
                        .await
                    {
                        tracing::error!(error = %e, "Failed to process due status checks");
                    }
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!(in_flight = in_flight.len(), "Status reconciler shutting down...");
        while in_flight.join_next().await.is_some() {}
    }

    /// Claims due checks, up to the number of free permits, and runs each on `tasks`.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be read.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub async fn process_due_jobs(&self, tasks: &mut JoinSet<()>) -> anyhow::Result<usize> {
        let available = self.semaphore.available_permits();
        if available == 0 {
            return Ok(0);
        }

        let jobs = self.queue.claim_due(self.clock.now(), available).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = jobs.len(), "Processing due status checks");
        let count = jobs.len();

        for job in jobs {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|e| anyhow::anyhow!("Semaphore closed: {e}"))?;

            let dispatcher = self.dispatcher.clone();
            let metrics = self.metrics.clone();
            let retry_delay = self.retry_delay(&job);
            let span = tracing::debug_span!("status_check", message_id = %job.message_id, attempt = job.attempt);

            tasks.spawn(
                async move {
                    let _permit = permit;

                    match dispatcher.check_message_status(&job.message_id).await {
                        Ok(refresh) if refresh.status.awaits_report() => {
                            metrics.checks.add(1, &[KeyValue::new("outcome", "pending")]);
                            tracing::debug!(status = %refresh.status, "Report not final yet");
                            Self::reschedule(&dispatcher, &job, retry_delay).await;
                        }
                        Ok(refresh) => {
                            metrics.checks.add(1, &[KeyValue::new("outcome", "refreshed")]);
                            tracing::debug!(status = %refresh.status, updated = refresh.updated, "Status check complete");
                        }
                        Err(DispatchError::Storage(e)) => {
                            metrics.checks.add(1, &[KeyValue::new("outcome", "storage_error")]);
                            tracing::error!(error = %e, "Failed to store refreshed status");
                            Self::reschedule(&dispatcher, &job, retry_delay).await;
                        }
                        Err(e) => {
                            metrics.checks.add(1, &[KeyValue::new("outcome", "failed")]);
                            tracing::warn!(error = %e, "Status check failed");
                            Self::reschedule(&dispatcher, &job, retry_delay).await;
                        }
                    }
                }
                .instrument(span),
            );
        }

        Ok(count)
    }

    /// Delay before the next attempt of `job`, or `None` once attempts are exhausted.
    #[must_use]
    pub fn retry_delay(&self, job: &StatusCheckJob) -> Option<Duration> {
        if job.attempt + 1 >= self.max_attempts {
            return None;
        }
        self.backoff.clone().build().nth(job.attempt as usize)
    }

    async fn reschedule(dispatcher: &NotificationDispatcher, job: &StatusCheckJob, delay: Option<Duration>) {
        match delay {
            Some(delay) => {
                tracing::debug!(retry_in = ?delay, "Rescheduling status check");
                dispatcher.schedule_status_check(job.retry(), delay).await;
            }
            None => tracing::warn!(attempts = job.attempt + 1, "Giving up on status check"),
        }
    }
}
