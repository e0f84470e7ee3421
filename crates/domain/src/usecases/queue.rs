//! Post queue - deferred per-platform delivery with completion bookkeeping

use std::sync::Arc;
use time::OffsetDateTime;

use crate::model::{QueueEntry, QueueItem, QueueReport, QueueStatus, ReadyItem};
use crate::ports::{Clock, DocumentStore, StorageError};
use crate::schedule::WeeklySchedule;
use crate::state::StateFile;

/// Errors from queue mutations
#[derive(Debug, thiserror::Error)]
#[error("Failed to save queue data while {operation}: {source}")]
pub struct QueueError {
    pub operation: String,
    #[source]
    pub source: StorageError,
}

/// Durable queue of scheduled publication work
pub struct PostQueue {
    state: StateFile<QueueItem>,
    schedule: WeeklySchedule,
    clock: Arc<dyn Clock>,
}

impl PostQueue {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        schedule: WeeklySchedule,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = StateFile::open(store).await;
        tracing::info!(
            location = %state.location(),
            items = state.entries().len(),
            "Loaded queue data"
        );
        Self {
            state,
            schedule,
            clock,
        }
    }

    /// Create or replace the queue item for `file`.
    ///
    /// Without an explicit time the next weekly slot after now is used.
    /// Returns the scheduled time.
    pub async fn schedule(
        &mut self,
        file: &str,
        platforms: &[String],
        scheduled_time: Option<OffsetDateTime>,
    ) -> Result<OffsetDateTime, QueueError> {
        let now = self.clock.now();
        let scheduled_time = scheduled_time.unwrap_or_else(|| self.next_slot());

        let mut pending: Vec<String> = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !pending.contains(platform) {
                pending.push(platform.clone());
            }
        }

        let item = QueueItem {
            added_at: now,
            scheduled_time,
            platforms: pending.clone(),
            status: QueueStatus::Queued,
            completed_at: None,
        };

        self.state
            .update(|items| items.insert(file.to_string(), item))
            .await
            .map_err(|source| QueueError {
                operation: format!("scheduling {}", file),
                source,
            })?;

        tracing::info!(
            file = %file,
            platforms = ?pending,
            scheduled_time = %scheduled_time,
            "Added to queue"
        );
        Ok(scheduled_time)
    }

    /// Next weekly slot strictly after now
    pub fn next_slot(&self) -> OffsetDateTime {
        self.schedule.next_after(self.clock.now())
    }

    /// Queued items whose scheduled time has arrived, in key order
    pub fn ready_items(&self) -> Vec<ReadyItem> {
        let now = self.clock.now();
        self.state
            .entries()
            .iter()
            .filter(|(_, item)| item.status == QueueStatus::Queued && item.scheduled_time <= now)
            .map(|(file, item)| ReadyItem {
                file: file.clone(),
                platforms: item.platforms.clone(),
                queued_at: item.added_at,
            })
            .collect()
    }

    pub fn is_queued(&self, file: &str) -> bool {
        self.state
            .get(file)
            .is_some_and(|item| item.status == QueueStatus::Queued)
    }

    pub fn item(&self, file: &str) -> Option<&QueueItem> {
        self.state.get(file)
    }

    /// Remove `platform` from the pending set of `file`.
    ///
    /// Returns whether anything changed. Unknown files, completed items and
    /// already-removed platforms are no-ops and are not written.
    pub async fn mark_completed(&mut self, file: &str, platform: &str) -> Result<bool, QueueError> {
        let pending = self.state.get(file).is_some_and(|item| {
            item.status == QueueStatus::Queued && item.platforms.iter().any(|p| p == platform)
        });
        if !pending {
            return Ok(false);
        }

        let now = self.clock.now();
        let completed = self
            .state
            .update(|items| {
                let Some(item) = items.get_mut(file) else {
                    return false;
                };
                item.platforms.retain(|p| p != platform);
                if item.platforms.is_empty() {
                    item.status = QueueStatus::Completed;
                    item.completed_at = Some(now);
                    return true;
                }
                false
            })
            .await
            .map_err(|source| QueueError {
                operation: format!("completing {} on {}", file, platform),
                source,
            })?;

        tracing::info!(file = %file, platform = %platform, completed = completed, "Marked queue item platform done");
        Ok(true)
    }

    /// Delete completed items finished more than `older_than_days` whole
    /// days ago. Queued items are never removed.
    pub async fn clean(&mut self, older_than_days: u32) -> Result<usize, QueueError> {
        let now = self.clock.now();
        let threshold = i64::from(older_than_days);
        let expired: Vec<String> = self
            .state
            .entries()
            .iter()
            .filter(|(_, item)| item.status == QueueStatus::Completed)
            .filter(|(_, item)| {
                item.completed_at
                    .is_some_and(|done| (now - done).whole_days() > threshold)
            })
            .map(|(file, _)| file.clone())
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        self.state
            .update(|items| {
                for file in &expired {
                    items.remove(file);
                }
            })
            .await
            .map_err(|source| QueueError {
                operation: "cleaning completed items".to_string(),
                source,
            })?;

        tracing::info!(removed = expired.len(), "Cleaned completed posts from queue");
        Ok(expired.len())
    }

    /// Full dump split by status
    pub fn queue_status(&self) -> QueueReport {
        let mut report = QueueReport::default();
        for (file, item) in self.state.entries() {
            let entry = QueueEntry {
                file: file.clone(),
                platforms: item.platforms.clone(),
                scheduled_time: item.scheduled_time,
                added_at: item.added_at,
                completed_at: item.completed_at,
            };
            match item.status {
                QueueStatus::Queued => report.queued.push(entry),
                QueueStatus::Completed => report.completed.push(entry),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MemoryStore};
    use time::Duration;
    use time::macros::datetime;

    fn both() -> Vec<String> {
        vec!["medium".to_string(), "devto".to_string()]
    }

    async fn open_queue(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> PostQueue {
        PostQueue::open(store, WeeklySchedule::default(), clock).await
    }

    #[tokio::test]
    async fn test_schedule_uses_next_weekly_slot() {
        let store = Arc::new(MemoryStore::new());
        // Wednesday
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store, clock).await;

        let at = queue.schedule("p.md", &both(), None).await.unwrap();

        assert_eq!(at, datetime!(2024-05-16 13:00 UTC));
        let item = queue.item("p.md").unwrap();
        assert_eq!(item.platforms, both());
        assert_eq!(item.status, QueueStatus::Queued);
        assert!(queue.ready_items().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_deduplicates_platforms() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store, clock).await;

        let platforms = vec![
            "devto".to_string(),
            "medium".to_string(),
            "devto".to_string(),
        ];
        queue.schedule("p.md", &platforms, None).await.unwrap();

        assert_eq!(queue.item("p.md").unwrap().platforms, vec!["devto", "medium"]);
    }

    #[tokio::test]
    async fn test_ready_items_respect_schedule() {
        let store = Arc::new(MemoryStore::new());
        let now = datetime!(2024-05-15 10:00 UTC);
        let clock = Arc::new(ManualClock::at(now));
        let mut queue = open_queue(store, clock.clone()).await;

        queue
            .schedule("now.md", &["medium".to_string()], Some(now))
            .await
            .unwrap();
        queue
            .schedule("later.md", &["devto".to_string()], Some(now + Duration::hours(1)))
            .await
            .unwrap();

        let ready = queue.ready_items();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].file, "now.md");
        assert_eq!(ready[0].queued_at, now);

        clock.advance(Duration::hours(1));
        assert_eq!(queue.ready_items().len(), 2);
    }

    #[tokio::test]
    async fn test_mark_completed_transitions_once_empty() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store, clock).await;
        queue.schedule("p.md", &both(), None).await.unwrap();

        assert!(queue.mark_completed("p.md", "medium").await.unwrap());
        let item = queue.item("p.md").unwrap();
        assert_eq!(item.platforms, vec!["devto"]);
        assert_eq!(item.status, QueueStatus::Queued);
        assert!(item.completed_at.is_none());

        assert!(queue.mark_completed("p.md", "devto").await.unwrap());
        let item = queue.item("p.md").unwrap();
        assert!(item.platforms.is_empty());
        assert_eq!(item.status, QueueStatus::Completed);
        assert!(item.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_completed_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store.clone(), clock).await;
        queue.schedule("p.md", &both(), None).await.unwrap();

        queue.mark_completed("p.md", "medium").await.unwrap();
        let saves = store.save_count();

        assert!(!queue.mark_completed("p.md", "medium").await.unwrap());
        assert!(!queue.mark_completed("unknown.md", "medium").await.unwrap());
        assert_eq!(store.save_count(), saves);
        assert_eq!(queue.item("p.md").unwrap().platforms, vec!["devto"]);
    }

    #[tokio::test]
    async fn test_clean_boundary_is_strictly_older() {
        let store = Arc::new(MemoryStore::new());
        let start = datetime!(2024-05-01 12:00 UTC);
        let clock = Arc::new(ManualClock::at(start));
        let mut queue = open_queue(store, clock.clone()).await;

        queue
            .schedule("done.md", &["medium".to_string()], Some(start))
            .await
            .unwrap();
        queue.mark_completed("done.md", "medium").await.unwrap();
        queue
            .schedule("waiting.md", &["devto".to_string()], Some(start))
            .await
            .unwrap();

        clock.set(start + Duration::days(7));
        assert_eq!(queue.clean(7).await.unwrap(), 0);
        assert!(queue.item("done.md").is_some());

        clock.set(start + Duration::days(8));
        assert_eq!(queue.clean(7).await.unwrap(), 1);
        assert!(queue.item("done.md").is_none());

        clock.set(start + Duration::days(400));
        assert_eq!(queue.clean(7).await.unwrap(), 0);
        assert!(queue.is_queued("waiting.md"));
    }

    #[tokio::test]
    async fn test_queue_status_splits_by_status() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store, clock).await;

        queue
            .schedule("queued.md", &["medium".to_string()], None)
            .await
            .unwrap();
        queue
            .schedule("completed.md", &["devto".to_string()], None)
            .await
            .unwrap();
        queue.mark_completed("completed.md", "devto").await.unwrap();

        let status = queue.queue_status();
        assert_eq!(status.queued.len(), 1);
        assert_eq!(status.queued[0].file, "queued.md");
        assert_eq!(status.completed.len(), 1);
        assert!(status.completed[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_save_surfaces_queue_error() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC)));
        let mut queue = open_queue(store.clone(), clock).await;

        store.fail_saves(true);
        let error = queue.schedule("p.md", &both(), None).await.unwrap_err();

        assert!(error.to_string().contains("Failed to save queue data"));
        assert!(queue.item("p.md").is_none());
    }
}
