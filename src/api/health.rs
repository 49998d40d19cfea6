use crate::api::MgmtState;
use crate::api::schemas::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks the message store and, when configured, Redis.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (store_res, redis_res) = tokio::join!(state.health_service.check_store(), state.health_service.check_redis());

    let mut status_code = StatusCode::OK;
    let database = if let Err(e) = store_res {
        tracing::warn!(error = %e, component = "database", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let redis = if let Err(e) = redis_res {
        tracing::warn!(error = %e, component = "redis", "Readiness probe failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        database: database.to_string(),
        redis: redis.to_string(),
    };

    (status_code, Json(response))
}
