//! Versioned document storage.
//!
//! A store holds whole documents addressed by path. Every read hands back a
//! [`Revision`] and every write must present the revision it was computed
//! from; a stale revision is rejected with [`StoreError::Conflict`].

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Opaque version token (a blob sha for GitHub).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct VersionedDocument {
    pub content: String,
    pub revision: Revision,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document was modified concurrently, fetch it again")]
    Conflict,

    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current document at `path`, or `None` if nothing was written there yet.
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, StoreError>;

    /// Replaces the document only if it is still at `expected`.
    /// `expected == None` creates the document and fails if one already exists.
    async fn replace(
        &self,
        path: &str,
        content: &str,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision, StoreError>;
}
