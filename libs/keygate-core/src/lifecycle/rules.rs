//! Pure lifecycle decisions over an in-memory record list.

use chrono::{DateTime, Duration, Utc};

use crate::error::LifecycleError;
use crate::models::key_record::add_hours;
use crate::models::{KeyDuration, KeyRecord};

/// Renewal is refused once fewer minutes than this are left.
pub const MIN_RENEW_REMAINING_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewTarget {
    /// Exact key and username, whatever the current state.
    Key { key: String, username: String },
    /// The active key of a user.
    ActiveFor { username: String },
}

impl RenewTarget {
    pub fn username(&self) -> &str {
        match self {
            RenewTarget::Key { username, .. } | RenewTarget::ActiveFor { username } => username,
        }
    }
}

pub fn find_active<'a>(
    records: &'a [KeyRecord],
    username: &str,
    now: DateTime<Utc>,
) -> Option<&'a KeyRecord> {
    records
        .iter()
        .find(|r| r.username == username && r.is_active(now))
}

pub fn find_exact<'a>(records: &'a [KeyRecord], key: &str, username: &str) -> Option<&'a KeyRecord> {
    records
        .iter()
        .find(|r| r.key == key && r.username == username)
}

/// Splits off expired timed records. Returns the kept records and how many were dropped.
pub fn prune_expired(records: Vec<KeyRecord>, now: DateTime<Utc>) -> (Vec<KeyRecord>, usize) {
    let before = records.len();
    let kept: Vec<KeyRecord> = records.into_iter().filter(|r| r.is_active(now)).collect();
    let removed = before - kept.len();
    (kept, removed)
}

pub fn resolve_target(records: &[KeyRecord], target: &RenewTarget, now: DateTime<Utc>) -> Option<usize> {
    match target {
        RenewTarget::Key { key, username } => records
            .iter()
            .position(|r| &r.key == key && &r.username == username),
        RenewTarget::ActiveFor { username } => records
            .iter()
            .position(|r| &r.username == username && r.is_active(now)),
    }
}

/// Whole minutes between `now` and expiry, rounded down.
fn minutes_left(remaining: Duration) -> i64 {
    remaining.num_minutes()
}

pub fn check_renewable(record: &KeyRecord, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    let Some(remaining) = record.remaining(now) else {
        return Err(LifecycleError::NotRenewable);
    };
    if record.duration.is_permanent() {
        return Err(LifecycleError::NotRenewable);
    }
    if remaining <= Duration::zero() {
        return Err(LifecycleError::AlreadyExpired);
    }
    if remaining < Duration::minutes(MIN_RENEW_REMAINING_MINUTES) {
        return Err(LifecycleError::TooCloseToExpiry {
            minutes_left: minutes_left(remaining),
        });
    }
    Ok(())
}

/// Pushes the expiry forward by `extension` hours, or by the record's own
/// duration when no extension is given.
pub fn renew(
    record: &mut KeyRecord,
    extension: Option<u32>,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    check_renewable(record, now)?;

    let hours = extension
        .or_else(|| record.duration.hours())
        .ok_or(LifecycleError::NotRenewable)?;
    let Some(expiry) = record.expires_at else {
        return Err(LifecycleError::NotRenewable);
    };

    record.expires_at = Some(add_hours(expiry, hours)?);
    record.last_renewed_at = Some(now);
    record.renew_count += 1;
    Ok(())
}

/// Parses an explicit renewal duration. Only timed, offered durations are allowed.
pub fn parse_extension(raw: &str) -> Result<u32, LifecycleError> {
    match KeyDuration::parse_offered(raw) {
        Some(KeyDuration::Hours(h)) => Ok(h),
        _ => Err(LifecycleError::Validation(format!(
            "invalid renewal duration: {}",
            raw
        ))),
    }
}
