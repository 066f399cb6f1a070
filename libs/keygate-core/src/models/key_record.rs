use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use super::timestamp;

pub const PERMANENT: &str = "permanent";

/// Hour counts offered to clients: 1h, 1d, 3d, 7d, 30d.
pub const OFFERED_HOURS: [u32; 5] = [1, 24, 72, 168, 720];

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDuration {
    Hours(u32),
    Permanent,
}

impl KeyDuration {
    /// Accepts any positive hour count, as found in stored documents.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == PERMANENT {
            return Some(KeyDuration::Permanent);
        }
        match raw.parse::<u32>() {
            Ok(hours) if hours > 0 => Some(KeyDuration::Hours(hours)),
            _ => None,
        }
    }

    /// Accepts only the durations a client may request, spelled exactly as listed.
    pub fn parse_offered(raw: &str) -> Option<Self> {
        Self::parse(raw).filter(|d| {
            let offered = match d {
                KeyDuration::Permanent => true,
                KeyDuration::Hours(h) => OFFERED_HOURS.contains(h),
            };
            offered && d.to_string() == raw
        })
    }

    pub fn hours(&self) -> Option<u32> {
        match self {
            KeyDuration::Hours(h) => Some(*h),
            KeyDuration::Permanent => None,
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, KeyDuration::Permanent)
    }

    /// Human readable label: "1 Hour", "3 Days", "Permanent".
    pub fn label(&self) -> String {
        match self {
            KeyDuration::Permanent => "Permanent".to_string(),
            KeyDuration::Hours(h) if *h < 24 => {
                format!("{} Hour{}", h, if *h > 1 { "s" } else { "" })
            }
            KeyDuration::Hours(h) => {
                let days = h / 24;
                format!("{} Day{}", days, if days > 1 { "s" } else { "" })
            }
        }
    }

    /// Expiry for a key issued at `from`, `None` when permanent.
    pub fn expiry_from(&self, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ExpiryOverflow> {
        self.hours().map(|h| add_hours(from, h)).transpose()
    }
}

/// An expiry that falls outside the representable time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("key expiry is out of range")]
pub struct ExpiryOverflow;

pub fn add_hours(at: DateTime<Utc>, hours: u32) -> Result<DateTime<Utc>, ExpiryOverflow> {
    at.checked_add_signed(Duration::hours(i64::from(hours)))
        .ok_or(ExpiryOverflow)
}

impl fmt::Display for KeyDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDuration::Hours(h) => write!(f, "{}", h),
            KeyDuration::Permanent => f.write_str(PERMANENT),
        }
    }
}

impl Serialize for KeyDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct KeyDurationVisitor;

impl Visitor<'_> for KeyDurationVisitor {
    type Value = KeyDuration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a positive hour count or \"permanent\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<KeyDuration, E> {
        KeyDuration::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<KeyDuration, E> {
        u32::try_from(v)
            .ok()
            .filter(|h| *h > 0)
            .map(KeyDuration::Hours)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<KeyDuration, E> {
        u64::try_from(v)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            .and_then(|v| self.visit_u64(v))
    }
}

impl<'de> Deserialize<'de> for KeyDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyDurationVisitor)
    }
}

/// One issued key as stored in the keys document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredKeyRecord")]
pub struct KeyRecord {
    pub key: String,
    pub username: String,
    pub duration: KeyDuration,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option")]
    pub expires_at: Option<DateTime<Utc>>,
    pub renew_count: u32,
    #[serde(with = "timestamp::option")]
    pub last_renewed_at: Option<DateTime<Utc>>,
    /// Fields written by other tools, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// Older documents carry `renewedAt` next to (or instead of) `lastRenewedAt`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredKeyRecord {
    key: String,
    username: String,
    duration: KeyDuration,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    renew_count: Option<u32>,
    #[serde(default, with = "timestamp::option")]
    last_renewed_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    renewed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<StoredKeyRecord> for KeyRecord {
    fn from(raw: StoredKeyRecord) -> Self {
        Self {
            key: raw.key,
            username: raw.username,
            duration: raw.duration,
            created_at: raw.created_at,
            expires_at: raw.expires_at,
            renew_count: raw.renew_count.unwrap_or(0),
            last_renewed_at: raw.last_renewed_at.or(raw.renewed_at),
            extra: raw.extra,
        }
    }
}

impl KeyRecord {
    /// Issues a fresh record with a new random key.
    pub fn issue(
        username: &str,
        duration: KeyDuration,
        now: DateTime<Utc>,
    ) -> Result<Self, ExpiryOverflow> {
        Ok(Self {
            key: generate_key(),
            username: username.to_string(),
            duration,
            created_at: now,
            expires_at: duration.expiry_from(now)?,
            renew_count: 0,
            last_renewed_at: None,
            extra: serde_json::Map::new(),
        })
    }

    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Permanent, or expiring strictly after `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_active(now)
    }

    /// Time left before expiry, `None` when permanent. Negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|expiry| expiry - now)
    }

    /// Short key prefix that is safe to put in logs.
    pub fn key_hint(&self) -> &str {
        key_hint(&self.key)
    }
}

/// 16 random bytes as 32 uppercase hex characters.
pub fn generate_key() -> String {
    hex::encode_upper(rand::random::<[u8; 16]>())
}

pub fn key_hint(key: &str) -> &str {
    key.get(..4).unwrap_or(key)
}

/// 3 to 20 characters of ASCII letters, digits or underscore.
pub fn is_valid_username(username: &str) -> bool {
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Display form used in messages, e.g. `18/10/2026, 14.05.00`.
pub fn format_display(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%d/%m/%Y, %H.%M.%S")
        .to_string()
}

pub fn format_display_opt(at: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    at.map(|at| format_display(at, offset))
        .unwrap_or_else(|| "Never".to_string())
}
