use crate::core::dispatcher::BulkRecipient;
use crate::domain::message::DeliveryStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SendSmsRequest {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsResponse {
    pub success: bool,
    pub message_id: Option<String>,
    pub status: DeliveryStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkSmsRequest {
    pub recipients: Vec<BulkRecipient>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub redis: String,
}
