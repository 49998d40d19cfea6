use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::{BulkSmsRequest, SendSmsRequest, SendSmsResponse};
use crate::core::dispatcher::{BulkReport, StatusRefresh};
use crate::core::transport::Balance;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State},
};

/// Sends a single SMS on behalf of the authenticated staff member.
///
/// # Errors
/// Returns `AppError::BadRequest` for an empty message or malformed phone number,
/// `AppError::TooManyRequests` when the recipient is rate limited, and a gateway error when the
/// provider does not accept the message.
pub async fn send_sms(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendSmsRequest>,
) -> Result<Json<SendSmsResponse>> {
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".into()));
    }

    let sent = state.dispatcher.send_sms(&payload.phone, &payload.message, &auth_user.sender_id).await?;

    Ok(Json(SendSmsResponse { success: true, message_id: sent.message_id, status: sent.status }))
}

/// Sends the same SMS to every recipient. Per-recipient failures are reported in the body.
///
/// # Errors
/// Returns `AppError::BadRequest` if the message or recipient list is empty.
pub async fn send_bulk_sms(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<BulkSmsRequest>,
) -> Result<Json<BulkReport>> {
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".into()));
    }
    if payload.recipients.is_empty() {
        return Err(AppError::BadRequest("recipients must not be empty".into()));
    }

    let report = state.dispatcher.send_bulk_sms(&payload.recipients, &payload.message, &auth_user.sender_id).await;

    Ok(Json(report))
}

/// Re-queries the provider for a message's delivery status.
///
/// # Errors
/// Returns a gateway error if the provider could not be queried.
pub async fn refresh_status(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<StatusRefresh>> {
    Ok(Json(state.dispatcher.check_message_status(&message_id).await?))
}

/// # Errors
/// Returns a gateway error if the provider could not be queried.
pub async fn get_balance(_auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<Balance>> {
    Ok(Json(state.dispatcher.get_balance().await?))
}
