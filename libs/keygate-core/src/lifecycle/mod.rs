//! Key lifecycle: generate, verify, renew and cleanup against the keys document.
//!
//! Every operation re-reads the document, decides in memory with the helpers in
//! [`rules`], and writes the full list back with the revision it read. Writes
//! that lose a race are recomputed from a fresh read a bounded number of times.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::LifecycleError;
use crate::models::key_record::{self, KeyDuration, KeyRecord};
use crate::repositories::KeyRepository;

pub mod rules;

pub use rules::RenewTarget;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub record: KeyRecord,
    pub label: String,
    pub expires_display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoKeysRegistered,
    Mismatch,
    Expired,
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NoKeysRegistered => "no keys registered",
            Rejection::Mismatch => "key invalid or username mismatch",
            Rejection::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Verification {
    Valid(KeyRecord),
    Invalid(Rejection),
}

#[derive(Debug, Clone)]
pub struct RenewedKey {
    pub record: KeyRecord,
    pub expires_display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct KeyService {
    repo: KeyRepository,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    display_offset: FixedOffset,
}

impl KeyService {
    pub fn new(repo: KeyRepository, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            display_offset: Utc.fix(),
        }
    }

    /// Total tries per write operation, at least one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Offset used for the human readable expiry strings.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn display(&self, at: Option<DateTime<Utc>>) -> String {
        key_record::format_display_opt(at, self.display_offset)
    }

    pub async fn generate(&self, username: &str, duration: &str) -> Result<IssuedKey, LifecycleError> {
        if !key_record::is_valid_username(username) {
            return Err(LifecycleError::Validation(
                "invalid username (3-20 characters, letters, digits and underscore only)".to_string(),
            ));
        }
        let duration = KeyDuration::parse_offered(duration)
            .ok_or_else(|| LifecycleError::Validation("invalid duration".to_string()))?;

        info!("Generating {} key for {}", duration.label(), username);
        self.with_retry("generate", || self.generate_once(username, duration))
            .await
    }

    async fn generate_once(
        &self,
        username: &str,
        duration: KeyDuration,
    ) -> Result<IssuedKey, LifecycleError> {
        let mut snapshot = self.repo.load_or_empty().await?;
        let now = self.now();

        if let Some(existing) = rules::find_active(&snapshot.records, username, now) {
            info!(
                "Rejected key for {}: active key {}... still valid",
                username,
                existing.key_hint()
            );
            return Err(LifecycleError::DuplicateActiveKey {
                expires_display: self.display(existing.expires_at),
                existing: Box::new(existing.clone()),
            });
        }

        let record = KeyRecord::issue(username, duration, now)?;
        let label = duration.label();
        let mut records = std::mem::take(&mut snapshot.records);
        records.push(record.clone());
        let total = records.len();

        self.repo
            .save(&snapshot, records, &format!("Add key for {} ({})", username, label))
            .await?;
        info!(
            "Issued key {}... for {} ({} key(s) stored)",
            record.key_hint(),
            username,
            total
        );

        Ok(IssuedKey {
            expires_display: self.display(record.expires_at),
            record,
            label,
        })
    }

    pub async fn verify(&self, key: &str, username: &str) -> Result<Verification, LifecycleError> {
        let Some(mut snapshot) = self.repo.load().await? else {
            return Ok(Verification::Invalid(Rejection::NoKeysRegistered));
        };
        let now = self.now();

        // Remember whether the caller's key is among the ones about to be pruned.
        let matched_expired = rules::find_exact(&snapshot.records, key, username)
            .is_some_and(|r| r.is_expired(now));

        let (kept, removed) = rules::prune_expired(std::mem::take(&mut snapshot.records), now);
        if removed > 0 {
            let message = format!("Auto cleanup: removed {} expired key(s)", removed);
            match self.repo.save(&snapshot, kept.clone(), &message).await {
                Ok(_) => info!("Verify pruned {} expired key(s)", removed),
                Err(e) => warn!("Verify could not prune {} expired key(s): {}", removed, e),
            }
        }

        if matched_expired {
            debug!("Key for {} has expired", username);
            return Ok(Verification::Invalid(Rejection::Expired));
        }

        let Some(record) = rules::find_exact(&kept, key, username) else {
            debug!("No key matching {}... for {}", key_record::key_hint(key), username);
            return Ok(Verification::Invalid(Rejection::Mismatch));
        };

        Ok(Verification::Valid(record.clone()))
    }

    /// Renews `target`. The expiry moves forward by `duration` hours when given,
    /// otherwise by the record's own duration.
    pub async fn renew(
        &self,
        target: RenewTarget,
        duration: Option<&str>,
    ) -> Result<RenewedKey, LifecycleError> {
        let extension = duration.map(rules::parse_extension).transpose()?;

        info!("Renewing key for {}", target.username());
        self.with_retry("renew", || self.renew_once(&target, extension))
            .await
    }

    async fn renew_once(
        &self,
        target: &RenewTarget,
        extension: Option<u32>,
    ) -> Result<RenewedKey, LifecycleError> {
        let Some(mut snapshot) = self.repo.load().await? else {
            return Err(LifecycleError::NotFound("keys file not found".to_string()));
        };
        let now = self.now();

        let index = rules::resolve_target(&snapshot.records, target, now)
            .ok_or_else(|| LifecycleError::NotFound("key not found".to_string()))?;

        let mut records = std::mem::take(&mut snapshot.records);
        rules::renew(&mut records[index], extension, now)?;
        let record = records[index].clone();

        self.repo
            .save(&snapshot, records, &format!("Renew key for {}", record.username))
            .await?;
        info!(
            "Renewed key {}... for {} (renewal #{})",
            record.key_hint(),
            record.username,
            record.renew_count
        );

        Ok(RenewedKey {
            expires_display: self.display(record.expires_at),
            record,
        })
    }

    pub async fn cleanup(&self) -> Result<CleanupReport, LifecycleError> {
        self.with_retry("cleanup", || self.cleanup_once()).await
    }

    async fn cleanup_once(&self) -> Result<CleanupReport, LifecycleError> {
        let Some(mut snapshot) = self.repo.load().await? else {
            info!("Cleanup: no keys file");
            return Ok(CleanupReport {
                deleted: 0,
                remaining: 0,
            });
        };

        let (kept, deleted) = rules::prune_expired(std::mem::take(&mut snapshot.records), self.now());
        let remaining = kept.len();

        if deleted > 0 {
            let message = format!("Cleanup: removed {} expired key(s)", deleted);
            self.repo.save(&snapshot, kept, &message).await?;
        }
        info!("Cleanup removed {} key(s), {} remaining", deleted, remaining);

        Ok(CleanupReport { deleted, remaining })
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LifecycleError>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(e) if e.is_conflict() && tries < self.max_attempts => {
                    warn!(
                        "{} lost a concurrent write (attempt {}/{}), retrying from a fresh read",
                        operation, tries, self.max_attempts
                    );
                    tries += 1;
                }
                result => return result,
            }
        }
    }
}
