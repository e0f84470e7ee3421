//! In-memory document store for testing and dry runs

use async_trait::async_trait;
use crosspost_domain::{Document, DocumentStore, StorageError};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory document store implementation
pub struct InMemoryDocumentStore {
    label: String,
    document: RwLock<Document>,
    fail_saves: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_document(label, Document::new())
    }

    /// Start from an existing document, e.g. a snapshot of on-disk state
    pub fn with_document(label: impl Into<String>, document: Document) -> Self {
        Self {
            label: label.into(),
            document: RwLock::new(document),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail with a `StorageError`
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Document {
        self.document
            .read()
            .map(|document| document.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self) -> Document {
        self.snapshot()
    }

    async fn save(&self, document: &Document) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: self.location(),
                source: std::io::Error::other("saves disabled"),
            });
        }
        let mut current = self
            .document
            .write()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        *current = document.clone();
        Ok(())
    }

    fn location(&self) -> String {
        format!("memory:{}", self.label)
    }
}
