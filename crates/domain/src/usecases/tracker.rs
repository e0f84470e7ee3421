//! Post tracker - durable per-file, per-platform publication status

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::model::{AttemptStatus, PostRecord};
use crate::ports::{Clock, DocumentStore, StorageError};
use crate::state::StateFile;

/// Errors from tracker mutations
#[derive(Debug, thiserror::Error)]
#[error("Failed to save tracking data while {operation}: {source}")]
pub struct TrackingError {
    pub operation: String,
    #[source]
    pub source: StorageError,
}

/// Tracks which (file, platform) pairs have been published
pub struct PostTracker {
    state: StateFile<PostRecord>,
    platforms: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl PostTracker {
    /// Open the tracker over a store for the given known platforms
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        platforms: Vec<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = StateFile::open(store).await;
        tracing::info!(
            location = %state.location(),
            posts = state.entries().len(),
            "Loaded tracking data"
        );
        Self {
            state,
            platforms,
            clock,
        }
    }

    /// Files that still need publishing, per known platform
    pub fn unpublished_files(
        &self,
        all_files: &BTreeSet<String>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        self.platforms
            .iter()
            .map(|platform| {
                let pending = all_files
                    .iter()
                    .filter(|file| !self.is_platform_published(file, platform))
                    .cloned()
                    .collect::<BTreeSet<_>>();
                tracing::debug!(platform = %platform, count = pending.len(), "Files need publishing");
                (platform.clone(), pending)
            })
            .collect()
    }

    pub fn is_platform_published(&self, file: &str, platform: &str) -> bool {
        self.state
            .get(file)
            .and_then(|record| record.platform(platform))
            .is_some_and(|entry| entry.is_published())
    }

    pub fn record(&self, file: &str) -> Option<&PostRecord> {
        self.state.get(file)
    }

    /// Record a successful publish. Last write wins.
    pub async fn mark_platform_published(
        &mut self,
        file: &str,
        platform: &str,
        url: &str,
        platform_id: Option<&str>,
    ) -> Result<(), TrackingError> {
        let now = self.clock.now();
        self.state
            .update(|records| {
                let record = records
                    .entry(file.to_string())
                    .or_insert_with(|| PostRecord::new(now));
                let entry = record.platform_entry(platform, now);
                entry.url = Some(url.to_string());
                entry.platform_id = platform_id.map(String::from);
                entry.published_at = Some(now);
                entry.last_updated_at = Some(now);
                entry.status = None;
                entry.status_message = None;
            })
            .await
            .map_err(|source| TrackingError {
                operation: format!("marking {} published on {}", file, platform),
                source,
            })?;

        tracing::info!(file = %file, platform = %platform, url = %url, "Marked as published");
        Ok(())
    }

    /// Record the outcome of an attempt that produced no URL
    pub async fn update_platform_status(
        &mut self,
        file: &str,
        platform: &str,
        status: AttemptStatus,
        message: Option<&str>,
    ) -> Result<(), TrackingError> {
        let now = self.clock.now();
        self.state
            .update(|records| {
                let record = records
                    .entry(file.to_string())
                    .or_insert_with(|| PostRecord::new(now));
                let entry = record.platform_entry(platform, now);
                entry.status = Some(status);
                entry.status_message = message.map(String::from);
                entry.last_updated_at = Some(now);
            })
            .await
            .map_err(|source| TrackingError {
                operation: format!("updating status of {} on {}", file, platform),
                source,
            })?;

        tracing::debug!(file = %file, platform = %platform, status = ?status, "Updated platform status");
        Ok(())
    }

    /// Record that the platform already holds this post
    pub async fn mark_platform_duplicate(
        &mut self,
        file: &str,
        platform: &str,
        message: Option<&str>,
    ) -> Result<(), TrackingError> {
        self.update_platform_status(file, platform, AttemptStatus::Duplicate, message)
            .await
    }

    pub fn status_report(&self) -> &BTreeMap<String, PostRecord> {
        self.state.entries()
    }
}
