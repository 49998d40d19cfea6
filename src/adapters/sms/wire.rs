//! Request and response bodies of the provider's HTTP API, and their mapping onto local
//! delivery statuses.

use crate::core::transport::{SendOutcome, StatusOutcome, TransportError};
use crate::domain::message::DeliveryStatus;
use serde::{Deserialize, Serialize};

/// Status id the provider uses when a trial account sends to a number outside its allow-list.
pub const NOT_ALLOW_LISTED_STATUS_ID: i64 = 579;

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub messages: [OutgoingMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct OutgoingMessage<'a> {
    pub destinations: [Destination<'a>; 1],
    pub from: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Destination<'a> {
    pub to: &'a str,
}

impl<'a> SendRequest<'a> {
    #[must_use]
    pub const fn single(to: &'a str, from: &'a str, text: &'a str) -> Self {
        Self { messages: [OutgoingMessage { destinations: [Destination { to }], from, text }] }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessageReport {
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: ProviderStatus,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessageReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: ProviderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReportsResponse {
    #[serde(default)]
    pub results: Vec<DeliveryReport>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceResponse {
    pub balance: f64,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub request_error: Option<RequestError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestError {
    pub service_exception: Option<ServiceException>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceException {
    pub message_id: Option<String>,
    pub text: Option<String>,
}

impl ErrorResponse {
    /// Human readable error text from an error body, if the body carries one.
    #[must_use]
    pub fn text(body: &str) -> Option<String> {
        serde_json::from_str::<Self>(body)
            .ok()
            .and_then(|e| e.request_error)
            .and_then(|e| e.service_exception)
            .and_then(|e| e.text.or(e.message_id))
    }
}

/// Maps the provider's answer to a send request.
#[must_use]
pub fn map_send_response(response: SendResponse) -> SendOutcome {
    let Some(report) = response.messages.into_iter().next() else {
        return SendOutcome::failed(TransportError::Decode("response contained no messages".to_string()));
    };

    match report.status.group_name.as_str() {
        "REJECTED" if report.status.id == Some(NOT_ALLOW_LISTED_STATUS_ID) => {
            SendOutcome::failed(TransportError::NotAllowListed)
        }
        "REJECTED" => SendOutcome::failed(TransportError::Rejected(report.status.describe())),
        "PENDING" | "ACCEPTED" => match report.message_id {
            Some(id) if !id.is_empty() => SendOutcome::sent(id),
            _ => SendOutcome::failed(TransportError::Decode("accepted message has no message id".to_string())),
        },
        other => SendOutcome {
            status: DeliveryStatus::Failed,
            message_id: report.message_id,
            error: Some(TransportError::Rejected(format!("unexpected status group {other:?}"))),
        },
    }
}

/// Maps a delivery report lookup. An empty result list means no report is available yet.
#[must_use]
pub fn map_reports_response(response: ReportsResponse) -> StatusOutcome {
    let Some(report) = response.results.into_iter().next() else {
        return StatusOutcome::failed(TransportError::NoReport);
    };

    StatusOutcome::reported(map_report_group(&report.status.group_name))
}

#[must_use]
pub fn map_report_group(group_name: &str) -> DeliveryStatus {
    match group_name {
        "DELIVERED" => DeliveryStatus::Delivered,
        "PENDING" => DeliveryStatus::Pending,
        "ACCEPTED" | "SCHEDULED" => DeliveryStatus::Sent,
        _ => DeliveryStatus::Failed,
    }
}

impl ProviderStatus {
    fn describe(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| format!("status group {}", self.group_name))
    }
}
