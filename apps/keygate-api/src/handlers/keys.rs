use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
};
use keygate_core::models::timestamp;
use keygate_core::{LifecycleError, RenewTarget, Verification};
use keygate_shared::api::{
    GenerateKeyRequest, GenerateKeyResponse, RenewKeyRequest, RenewKeyResponse, VerifiedKey,
    VerifyKeyRequest, VerifyKeyResponse,
};

use crate::AppState;
use crate::error::ApiError;

/// Present, non-empty request field, passed on exactly as sent.
fn required(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub async fn generate_key(
    State(state): State<AppState>,
    payload: Result<Json<GenerateKeyRequest>, JsonRejection>,
) -> Result<Json<GenerateKeyResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let username = required(req.username.as_deref());
    let duration = req.duration.as_ref().map(|d| d.as_text());
    let (Some(username), Some(duration)) = (username, required(duration.as_deref())) else {
        return Err(LifecycleError::Validation(
            "username and duration are required".to_string(),
        )
        .into());
    };

    let issued = state.keys.generate(username, duration).await?;
    let record = issued.record;

    Ok(Json(GenerateKeyResponse {
        success: true,
        message: format!("Key created for {}", record.username),
        key: record.key,
        username: record.username,
        duration: record.duration.to_string(),
        duration_label: issued.label,
        created_at: timestamp::format(&record.created_at),
        expires_at: record.expires_at.as_ref().map(timestamp::format),
        expires_at_formatted: issued.expires_display,
    }))
}

fn invalid(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<VerifyKeyResponse>) {
    (
        status,
        Json(VerifyKeyResponse {
            valid: false,
            message: None,
            error: Some(error.into()),
            data: None,
        }),
    )
}

pub async fn verify_key_query(
    State(state): State<AppState>,
    query: Result<Query<VerifyKeyRequest>, QueryRejection>,
) -> (StatusCode, Json<VerifyKeyResponse>) {
    match query {
        Ok(Query(req)) => verify(&state, req).await,
        Err(e) => invalid(StatusCode::BAD_REQUEST, e.body_text()),
    }
}

pub async fn verify_key_body(
    State(state): State<AppState>,
    payload: Result<Json<VerifyKeyRequest>, JsonRejection>,
) -> (StatusCode, Json<VerifyKeyResponse>) {
    match payload {
        Ok(Json(req)) => verify(&state, req).await,
        Err(e) => invalid(StatusCode::BAD_REQUEST, e.body_text()),
    }
}

async fn verify(state: &AppState, req: VerifyKeyRequest) -> (StatusCode, Json<VerifyKeyResponse>) {
    let (Some(key), Some(username)) = (
        required(req.key.as_deref()),
        required(req.username.as_deref()),
    ) else {
        return invalid(StatusCode::BAD_REQUEST, "key and username are required");
    };

    match state.keys.verify(key, username).await {
        Ok(Verification::Valid(record)) => (
            StatusCode::OK,
            Json(VerifyKeyResponse {
                valid: true,
                message: Some("Key is valid".to_string()),
                error: None,
                data: Some(VerifiedKey {
                    username: record.username,
                    duration: record.duration.to_string(),
                    created_at: timestamp::format(&record.created_at),
                    expires_at: record.expires_at.as_ref().map(timestamp::format),
                }),
            }),
        ),
        Ok(Verification::Invalid(rejection)) => invalid(StatusCode::OK, rejection.reason()),
        Err(e) => {
            let error = ApiError::from(e);
            let status = error.status();
            if status.is_server_error() {
                tracing::error!("Verify failed: {}", error);
            }
            invalid(status, error.to_string())
        }
    }
}

pub async fn renew_key(
    State(state): State<AppState>,
    payload: Result<Json<RenewKeyRequest>, JsonRejection>,
) -> Result<Json<RenewKeyResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let Some(username) = required(req.username.as_deref()) else {
        return Err(LifecycleError::Validation("username is required".to_string()).into());
    };
    let target = match required(req.key.as_deref()) {
        Some(key) => RenewTarget::Key {
            key: key.to_string(),
            username: username.to_string(),
        },
        None => RenewTarget::ActiveFor {
            username: username.to_string(),
        },
    };
    let duration = req.duration.as_ref().map(|d| d.as_text());

    let renewed = state.keys.renew(target, duration.as_deref()).await?;
    let record = renewed.record;
    let new_expires_at = record
        .expires_at
        .as_ref()
        .map(timestamp::format)
        .unwrap_or_default();

    Ok(Json(RenewKeyResponse {
        success: true,
        message: format!("Key renewed, now expires at {}", renewed.expires_display),
        new_expires_at,
        renew_count: record.renew_count,
        new_expires_at_formatted: renewed.expires_display,
    }))
}
