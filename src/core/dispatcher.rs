use crate::core::clock::Clock;
use crate::core::message_store::MessageStore;
use crate::core::rate_limiter::RateLimiter;
use crate::core::status_queue::{StatusCheckJob, StatusCheckQueue};
use crate::core::transport::{Balance, SmsTransport, TransportError};
use crate::domain::message::{DeliveryStatus, NewOutboundMessage};
use crate::domain::phone::PhoneNumber;
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid phone number format: {0}")]
    InvalidPhoneFormat(String),
    #[error("rate limit exceeded for {0}")]
    RateLimitExceeded(String),
    #[error("SMS provider configuration is incomplete")]
    ConfigurationIncomplete,
    #[error("provider rejected the message: {0}")]
    ProviderRejected(String),
    #[error("SMS transport error: {0}")]
    Transport(String),
    #[error("status check failed: {0}")]
    StatusCheckFailed(String),
    #[error("message store error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConfigurationIncomplete => Self::ConfigurationIncomplete,
            TransportError::NotAllowListed | TransportError::Rejected(_) | TransportError::Forbidden => {
                Self::ProviderRejected(err.to_string())
            }
            TransportError::Unauthorized
            | TransportError::Http(_)
            | TransportError::Decode(_)
            | TransportError::NoReport => Self::Transport(err.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DispatchPolicy {
    /// Calling code substituted for a leading trunk `0`.
    pub country_code: String,
    /// Delay before the first delivery status check of an accepted message.
    pub status_check_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self { country_code: "+251".to_string(), status_check_delay: Duration::from_secs(5) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    /// Id of the stored record, absent if the accepted send could not be recorded.
    pub record_id: Option<Uuid>,
    pub message_id: Option<String>,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRefresh {
    pub message_id: String,
    pub status: DeliveryStatus,
    pub updated: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkRecipient {
    pub phone: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientResult {
    pub phone: String,
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub success: bool,
    pub results: Vec<RecipientResult>,
}

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    refused: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("sms-notifier");
        Self {
            sent: meter
                .u64_counter("sms_sent_total")
                .with_description("Messages handed to the provider, by immediate status")
                .build(),
            refused: meter
                .u64_counter("sms_refused_total")
                .with_description("Messages refused before reaching the provider")
                .build(),
        }
    }
}

/// Sequences validation, rate limiting, transport, and persistence for outbound SMS.
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    transport: Arc<dyn SmsTransport>,
    limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn MessageStore>,
    status_queue: Arc<dyn StatusCheckQueue>,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
    metrics: Metrics,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn SmsTransport>,
        limiter: Arc<dyn RateLimiter>,
        store: Arc<dyn MessageStore>,
        status_queue: Arc<dyn StatusCheckQueue>,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
    ) -> Self {
        Self { transport, limiter, store, status_queue, clock, policy, metrics: Metrics::new() }
    }

    /// Sends `message` to `phone` on behalf of `sender_id` and records the attempt.
    ///
    /// # Errors
    /// Returns `InvalidPhoneFormat` or `RateLimitExceeded` without contacting the provider, or
    /// the provider's verdict converted into a `DispatchError` when it did not accept the
    /// message. A failure to record the attempt is logged and does not change the verdict.
    #[tracing::instrument(skip_all, fields(sender_id = %sender_id, message_id), err(level = "warn"))]
    pub async fn send_sms(&self, phone: &str, message: &str, sender_id: &str) -> Result<SentMessage, DispatchError> {
        let phone = match PhoneNumber::parse(phone, &self.policy.country_code) {
            Ok(phone) => phone,
            Err(e) => {
                self.metrics.refused.add(1, &[KeyValue::new("reason", "invalid_phone")]);
                return Err(e);
            }
        };

        match self.limiter.allow(phone.as_str()).await {
            Ok(true) => {}
            Ok(false) => {
                self.metrics.refused.add(1, &[KeyValue::new("reason", "rate_limited")]);
                return Err(DispatchError::RateLimitExceeded(phone.into_inner()));
            }
            Err(e) => tracing::warn!(error = %e, "Rate limiter unavailable, allowing send"),
        }

        let outcome = self.transport.send(phone.as_str(), message).await;
        self.metrics.sent.add(1, &[KeyValue::new("status", outcome.status.as_str())]);
        if let Some(id) = &outcome.message_id {
            tracing::Span::current().record("message_id", id.as_str());
        }

        let record = self
            .store
            .insert(NewOutboundMessage {
                phone_number: phone.into_inner(),
                body: message.to_string(),
                status: outcome.status,
                provider_message_id: outcome.message_id.clone(),
                sender_id: sender_id.to_string(),
                error: outcome.error.as_ref().map(ToString::to_string),
                created_at: self.clock.now(),
            })
            .await;

        // The provider verdict stands even when the attempt cannot be recorded.
        let record_id = match record {
            Ok(record) => Some(record.id),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    message_id = outcome.message_id.as_deref().unwrap_or_default(),
                    status = %outcome.status,
                    "Failed to record SMS attempt"
                );
                None
            }
        };

        if outcome.status.awaits_report()
            && let Some(id) = &outcome.message_id
        {
            self.schedule_status_check(StatusCheckJob::first(id.clone()), self.policy.status_check_delay).await;
        }

        if outcome.status.is_accepted() {
            tracing::info!(status = %outcome.status, "SMS accepted by provider");
            return Ok(SentMessage { record_id, message_id: outcome.message_id, status: outcome.status });
        }

        Err(outcome.error.map_or_else(
            || DispatchError::Transport(format!("provider returned status {}", outcome.status)),
            DispatchError::from,
        ))
    }

    /// Re-queries the provider for `message_id` and advances every stored record carrying it.
    ///
    /// # Errors
    /// Returns `StatusCheckFailed` if the provider could not be queried and `Storage` if the
    /// records could not be updated.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn check_message_status(&self, message_id: &str) -> Result<StatusRefresh, DispatchError> {
        let outcome = self.transport.check_status(message_id).await;

        if let Some(err) = outcome.error {
            return Err(match err {
                TransportError::ConfigurationIncomplete => DispatchError::ConfigurationIncomplete,
                other => DispatchError::StatusCheckFailed(other.to_string()),
            });
        }

        let updated = self.store.advance_status(message_id, outcome.status).await?;
        tracing::debug!(status = %outcome.status, updated, "Delivery status refreshed");

        Ok(StatusRefresh { message_id: message_id.to_string(), status: outcome.status, updated })
    }

    /// # Errors
    /// Returns the transport failure converted into a `DispatchError`.
    pub async fn get_balance(&self) -> Result<Balance, DispatchError> {
        self.transport.get_balance().await.map_err(DispatchError::from)
    }

    /// Sends `message` to each recipient in order. A failure for one recipient does not stop the
    /// others and nothing already sent is undone.
    #[tracing::instrument(skip_all, fields(sender_id = %sender_id, recipients = recipients.len()))]
    pub async fn send_bulk_sms(&self, recipients: &[BulkRecipient], message: &str, sender_id: &str) -> BulkReport {
        let mut results = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let result = match self.send_sms(&recipient.phone, message, sender_id).await {
                Ok(sent) => RecipientResult {
                    phone: recipient.phone.clone(),
                    name: recipient.name.clone(),
                    success: true,
                    message_id: sent.message_id,
                    error: None,
                },
                Err(e) => RecipientResult {
                    phone: recipient.phone.clone(),
                    name: recipient.name.clone(),
                    success: false,
                    message_id: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            tracing::warn!(failed, total = results.len(), "Bulk send finished with failures");
        }

        BulkReport { success: failed == 0, results }
    }

    /// Queues a status check for `job` after `delay`. Failures are logged only, so a send that
    /// already reached the provider is never reported as failed because of them.
    pub async fn schedule_status_check(&self, job: StatusCheckJob, delay: Duration) {
        let run_at = self.clock.now() + delay;
        if let Err(e) = self.status_queue.schedule(job.clone(), run_at).await {
            tracing::error!(error = %e, message_id = %job.message_id, "Failed to schedule status check");
        }
    }
}
