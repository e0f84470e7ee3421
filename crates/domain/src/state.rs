//! Typed view over a persisted JSON document
//!
//! Entries are decoded on open. Mutations are applied to a copy, saved, and
//! only then committed to memory, so a failed save leaves the in-memory view
//! matching what is on disk.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ports::{Document, DocumentStore, StorageError};

pub struct StateFile<T> {
    store: Arc<dyn DocumentStore>,
    entries: BTreeMap<String, T>,
    /// Entries that failed to decode; written back untouched
    unreadable: Document,
}

impl<T> StateFile<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub async fn open(store: Arc<dyn DocumentStore>) -> Self {
        let document = store.load().await;
        let mut entries = BTreeMap::new();
        let mut unreadable = Document::new();

        for (key, value) in document {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(error) => {
                    tracing::warn!(
                        location = %store.location(),
                        key = %key,
                        error = %error,
                        "Keeping unreadable state entry as-is"
                    );
                    unreadable.insert(key, value);
                }
            }
        }

        tracing::debug!(
            location = %store.location(),
            entries = entries.len(),
            "Loaded state"
        );

        Self {
            store,
            entries,
            unreadable,
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, T> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    /// Apply `change` to a copy of the entries and persist it.
    /// The in-memory entries are replaced only after a successful save.
    pub async fn update<R>(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, T>) -> R,
    ) -> Result<R, StorageError> {
        let mut next = self.entries.clone();
        let result = change(&mut next);

        let document = self.encode(&next)?;
        self.store.save(&document).await?;

        self.unreadable.retain(|key, _| !next.contains_key(key));
        self.entries = next;
        Ok(result)
    }

    fn encode(&self, entries: &BTreeMap<String, T>) -> Result<Document, StorageError> {
        let mut document = self.unreadable.clone();
        for (key, entry) in entries {
            let value = serde_json::to_value(entry)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            document.insert(key.clone(), value);
        }
        Ok(document)
    }
}
