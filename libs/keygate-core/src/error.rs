use thiserror::Error;

use crate::models::{ExpiryOverflow, KeyRecord};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error(
        "user {} already has an active key that expires at {expires_display}. Wait until it expires or renew it.",
        .existing.username
    )]
    DuplicateActiveKey {
        existing: Box<KeyRecord>,
        expires_display: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("permanent keys do not need to be renewed")]
    NotRenewable,

    #[error("key has already expired and cannot be renewed")]
    AlreadyExpired,

    #[error(
        "keys can only be renewed while more than 1 hour remains. Time remaining: {minutes_left} minute(s)"
    )]
    TooCloseToExpiry { minutes_left: i64 },

    #[error(transparent)]
    ExpiryOverflow(#[from] ExpiryOverflow),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LifecycleError::Store(StoreError::Conflict))
    }
}
