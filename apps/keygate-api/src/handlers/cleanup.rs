use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use keygate_shared::api::CleanupResponse;
use subtle::ConstantTimeEq;

use crate::AppState;
use crate::error::ApiError;

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, ApiError> {
    let authorized = match (state.cron_secret.as_deref(), extract_bearer_token(&headers)) {
        (Some(secret), Some(token)) => bool::from(token.as_bytes().ct_eq(secret.as_bytes())),
        _ => false,
    };
    if !authorized {
        tracing::warn!("Rejected cleanup request without a valid bearer token");
        return Err(ApiError::Unauthorized);
    }

    let report = state.keys.cleanup().await?;
    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Cleanup finished, removed {} expired key(s)", report.deleted),
        deleted_count: report.deleted,
        remaining_keys: report.remaining,
    }))
}
