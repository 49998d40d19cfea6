use crate::domain::message::DeliveryStatus;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("SMS provider configuration is incomplete")]
    ConfigurationIncomplete,
    #[error("destination is not on the allow-list of this account")]
    NotAllowListed,
    #[error("message rejected by provider: {0}")]
    Rejected(String),
    #[error("unauthorized: invalid API key")]
    Unauthorized,
    #[error("forbidden: sender not approved or account inactive")]
    Forbidden,
    #[error("provider request failed: {0}")]
    Http(String),
    #[error("unexpected provider response: {0}")]
    Decode(String),
    #[error("no delivery report available yet")]
    NoReport,
}

/// Immediate result of handing a message to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
    pub error: Option<TransportError>,
}

impl SendOutcome {
    #[must_use]
    pub const fn sent(message_id: String) -> Self {
        Self { status: DeliveryStatus::Sent, message_id: Some(message_id), error: None }
    }

    #[must_use]
    pub const fn failed(error: TransportError) -> Self {
        Self { status: DeliveryStatus::Failed, message_id: None, error: Some(error) }
    }
}

/// Result of a delivery report lookup. `error` is set when the lookup itself failed, as opposed
/// to the provider reporting the message as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    pub status: DeliveryStatus,
    pub error: Option<TransportError>,
}

impl StatusOutcome {
    #[must_use]
    pub const fn reported(status: DeliveryStatus) -> Self {
        Self { status, error: None }
    }

    #[must_use]
    pub const fn failed(error: TransportError) -> Self {
        Self { status: DeliveryStatus::Failed, error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub balance: f64,
    pub currency: Option<String>,
}

/// One SMS provider integration. Implementations never fail outright: every transport problem
/// is folded into the returned outcome.
#[async_trait]
pub trait SmsTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, to: &str, body: &str) -> SendOutcome;

    async fn check_status(&self, message_id: &str) -> StatusOutcome;

    /// # Errors
    /// Returns the `TransportError` describing why the balance could not be read.
    async fn get_balance(&self) -> Result<Balance, TransportError>;
}
