use std::sync::Arc;
use tracing::debug;

use crate::models::KeyRecord;
use crate::store::{DocumentStore, Revision, StoreError};

pub const DEFAULT_KEYS_PATH: &str = "keys.json";

/// Records as read from the store, together with the revision they were read at.
///
/// Writing goes through [`KeyRepository::save`], which takes the snapshot the
/// new list was computed from, so the revision always travels with the data.
#[derive(Debug, Clone, Default)]
pub struct KeySnapshot {
    pub records: Vec<KeyRecord>,
    revision: Option<Revision>,
}

impl KeySnapshot {
    pub fn revision(&self) -> Option<&Revision> {
        self.revision.as_ref()
    }

    /// False when the document did not exist at read time.
    pub fn exists(&self) -> bool {
        self.revision.is_some()
    }
}

#[derive(Clone)]
pub struct KeyRepository {
    store: Arc<dyn DocumentStore>,
    path: String,
}

impl KeyRepository {
    pub fn new(store: Arc<dyn DocumentStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `Ok(None)` when the keys document does not exist yet.
    pub async fn load(&self) -> Result<Option<KeySnapshot>, StoreError> {
        let Some(doc) = self.store.fetch(&self.path).await? else {
            debug!("No keys document at {}", self.path);
            return Ok(None);
        };

        let records = decode(&doc.content)?;
        debug!("Loaded {} key(s) from {}", records.len(), self.path);
        Ok(Some(KeySnapshot {
            records,
            revision: Some(doc.revision),
        }))
    }

    /// Like [`load`](Self::load), treating a missing document as an empty list.
    pub async fn load_or_empty(&self) -> Result<KeySnapshot, StoreError> {
        Ok(self.load().await?.unwrap_or_default())
    }

    pub async fn save(
        &self,
        base: &KeySnapshot,
        records: Vec<KeyRecord>,
        message: &str,
    ) -> Result<KeySnapshot, StoreError> {
        let content = encode(&records)?;
        let revision = self
            .store
            .replace(&self.path, &content, base.revision(), message)
            .await?;
        debug!("Saved {} key(s) to {} at {}", records.len(), self.path, revision);

        Ok(KeySnapshot {
            records,
            revision: Some(revision),
        })
    }
}

fn decode(content: &str) -> Result<Vec<KeyRecord>, StoreError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(content).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn encode(records: &[KeyRecord]) -> Result<String, StoreError> {
    serde_json::to_string_pretty(records).map_err(|e| StoreError::Malformed(e.to_string()))
}
