use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{DocumentStore, Revision, StoreError, VersionedDocument};

#[derive(Debug)]
struct Entry {
    content: String,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, Entry>,
    next_version: u64,
    messages: Vec<String>,
}

/// In-process store with the same conflict rules as the remote one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `path` without recording a change message.
    pub fn with_document(self, path: &str, content: impl Into<String>) -> Self {
        {
            let mut inner = self.lock();
            inner.next_version += 1;
            let version = inner.next_version;
            inner.documents.insert(
                path.to_string(),
                Entry {
                    content: content.into(),
                    version,
                },
            );
        }
        self
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.lock().documents.get(path).map(|e| e.content.clone())
    }

    pub fn revision(&self, path: &str) -> Option<Revision> {
        self.lock()
            .documents
            .get(path)
            .map(|e| revision_of(e.version))
    }

    /// Change messages of every accepted write, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn revision_of(version: u64) -> Revision {
    Revision::new(format!("rev-{version}"))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, StoreError> {
        Ok(self.lock().documents.get(path).map(|e| VersionedDocument {
            content: e.content.clone(),
            revision: revision_of(e.version),
        }))
    }

    async fn replace(
        &self,
        path: &str,
        content: &str,
        expected: Option<&Revision>,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let mut inner = self.lock();
        let current = inner.documents.get(path).map(|e| revision_of(e.version));
        if current.as_ref() != expected {
            return Err(StoreError::Conflict);
        }

        inner.next_version += 1;
        let version = inner.next_version;
        inner.documents.insert(
            path.to_string(),
            Entry {
                content: content.to_string(),
                version,
            },
        );
        inner.messages.push(message.to_string());
        Ok(revision_of(version))
    }
}
