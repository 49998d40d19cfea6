use crate::core::dispatcher::DispatchError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed")]
    AuthError,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Too many requests: {0}")]
    TooManyRequests(String),
    #[error("Upstream provider error: {0}")]
    BadGateway(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidPhoneFormat(_) => Self::BadRequest(err.to_string()),
            DispatchError::RateLimitExceeded(_) => Self::TooManyRequests(err.to_string()),
            DispatchError::ConfigurationIncomplete => Self::ServiceUnavailable(err.to_string()),
            DispatchError::ProviderRejected(_) | DispatchError::Transport(_) | DispatchError::StatusCheckFailed(_) => {
                Self::BadGateway(err.to_string())
            }
            DispatchError::Storage(e) => {
                tracing::error!(error = %e, "Message store error");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::AuthError => {
                tracing::debug!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::TooManyRequests(msg) => {
                tracing::debug!(message = %msg, "Rate limited");
                (StatusCode::TOO_MANY_REQUESTS, msg)
            }
            Self::BadGateway(msg) => {
                tracing::warn!(message = %msg, "Provider error");
                (StatusCode::BAD_GATEWAY, msg)
            }
            Self::ServiceUnavailable(msg) => {
                tracing::warn!(message = %msg, "Service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
