//! JSON file document store with atomic replacement and a rolling backup
//!
//! Layout for `published_posts.json`:
//! - `published_posts.json`        current document
//! - `published_posts.backup.json` previous document
//! - `published_posts.json.tmp`    in-flight write

use async_trait::async_trait;
use crosspost_domain::{Document, DocumentStore, StorageError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Document store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling holding the previous document
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{}.backup.json", stem))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{}.tmp", name))
    }

    /// Read the primary, falling back to the backup. Never writes.
    ///
    /// Returns the document and whether it came from the primary.
    pub async fn read(&self) -> (Option<Document>, bool) {
        if let Some(document) = read_object(&self.path).await {
            return (Some(document), true);
        }
        let backup = self.backup_path();
        match read_object(&backup).await {
            Some(document) => {
                tracing::warn!(path = %backup.display(), "Recovered state from backup");
                (Some(document), false)
            }
            None => (None, false),
        }
    }

    async fn write_file(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let mut file = fs::File::create(path).await.map_err(|e| io_error(path, e))?;
        file.write_all(contents)
            .await
            .map_err(|e| io_error(path, e))?;
        file.sync_all().await.map_err(|e| io_error(path, e))?;
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        Ok(())
    }

    async fn sync_parent(&self) {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        // Not supported everywhere
        if let Ok(dir) = fs::File::open(parent).await {
            if let Err(error) = dir.sync_all().await {
                tracing::debug!(path = %parent.display(), error = %error, "Directory sync skipped");
            }
        }
    }

    async fn write_in_place(&self, document: &Document) -> Result<(), StorageError> {
        let contents = encode(document)?;
        self.ensure_parent().await?;
        Self::write_file(&self.path, &contents).await
    }

    /// Rewrite the primary in place after a fallback load; the backup is left alone
    async fn heal(&self, document: &Document) {
        match self.write_in_place(document).await {
            Ok(()) => tracing::info!(path = %self.path.display(), "Rewrote state file"),
            Err(error) => {
                tracing::error!(path = %self.path.display(), error = %error, "Failed to rewrite state file")
            }
        }
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self) -> Document {
        let (document, from_primary) = self.read().await;
        if from_primary {
            return document.unwrap_or_default();
        }

        let document = document.unwrap_or_else(|| {
            tracing::info!(path = %self.path.display(), "No usable state found, starting empty");
            Document::new()
        });
        self.heal(&document).await;
        document
    }

    async fn save(&self, document: &Document) -> Result<(), StorageError> {
        let contents = encode(document)?;
        self.ensure_parent().await?;

        let temp = self.temp_path();
        Self::write_file(&temp, &contents).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let backup = self.backup_path();
            fs::rename(&self.path, &backup)
                .await
                .map_err(|e| io_error(&backup, e))?;
        }

        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        self.sync_parent().await;

        tracing::debug!(path = %self.path.display(), entries = document.len(), "Saved state");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pretty-printed, key-sorted JSON with a trailing newline
fn encode(document: &Document) -> Result<Vec<u8>, StorageError> {
    let mut contents = serde_json::to_vec_pretty(document)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    contents.push(b'\n');
    Ok(contents)
}

async fn read_object(path: &Path) -> Option<Document> {
    let raw = match fs::read(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "Failed to read state file");
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(document)) => Some(document),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "State file is not a JSON object, ignoring");
            None
        }
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "State file is not valid JSON");
            None
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
