use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keygate_core::LifecycleError;
use keygate_core::models::timestamp;
use keygate_shared::api::{ErrorResponse, ExistingKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Lifecycle(e) => match e {
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Store(_) if e.is_conflict() => StatusCode::BAD_REQUEST,
                LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LifecycleError::Validation(_)
                | LifecycleError::DuplicateActiveKey { .. }
                | LifecycleError::NotRenewable
                | LifecycleError::AlreadyExpired
                | LifecycleError::TooCloseToExpiry { .. }
                | LifecycleError::ExpiryOverflow(_) => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let existing_key = match &self {
            ApiError::Lifecycle(LifecycleError::DuplicateActiveKey { existing, .. }) => {
                Some(ExistingKey {
                    key: existing.key.clone(),
                    expires_at: existing.expires_at.as_ref().map(timestamp::format),
                    duration: existing.duration.to_string(),
                })
            }
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            existing_key,
        };
        (status, Json(body)).into_response()
    }
}
