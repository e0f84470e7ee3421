//! Publish cycle use case - selects work, publishes per platform, records outcomes

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::model::{
    AttemptOutcome, AttemptStatus, ConvertedPost, CycleReport, PublishMode, ScheduledPost,
};
use crate::ports::{PostRepository, PublishError, PublishResult, Publisher};
use crate::usecases::{
    cooldown::{CooldownBook, CooldownError},
    queue::{PostQueue, QueueError},
    tracker::{PostTracker, TrackingError},
};

/// Configuration for the publish cycle
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Immediate or scheduled selection of work
    pub mode: PublishMode,
    /// Convert and report only; no publisher calls, no state writes
    pub dry_run: bool,
    /// Extra attempts for transient failures
    pub max_retries: u32,
    /// Pause between transient retries
    pub retry_delay: Duration,
    /// Cooldown applied when a platform rate limits without Retry-After
    pub cooldown: Duration,
    /// Retention for completed queue items
    pub clean_after_days: u32,
    /// Pause between successful publishes on the same platform
    pub platform_delays: HashMap<String, Duration>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::Immediate,
            dry_run: false,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            cooldown: Duration::from_secs(3600),
            clean_after_days: 7,
            platform_delays: HashMap::new(),
        }
    }
}

impl CycleConfig {
    pub fn delay_for(&self, platform: &str) -> Duration {
        self.platform_delays
            .get(platform)
            .copied()
            .unwrap_or_default()
    }
}

/// Errors that abort a cycle
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Failed to list posts: {0}")]
    Source(String),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Cooldown(#[from] CooldownError),
}

impl CycleError {
    /// State could not be persisted; further cycles must not run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Source(_))
    }
}

/// Publication orchestrator
pub struct PublishCycle {
    posts: Arc<dyn PostRepository>,
    publishers: Vec<Arc<dyn Publisher>>,
    tracker: PostTracker,
    queue: PostQueue,
    cooldowns: CooldownBook,
    config: CycleConfig,
}

impl PublishCycle {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        publishers: Vec<Arc<dyn Publisher>>,
        tracker: PostTracker,
        queue: PostQueue,
        cooldowns: CooldownBook,
        config: CycleConfig,
    ) -> Self {
        Self {
            posts,
            publishers,
            tracker,
            queue,
            cooldowns,
            config,
        }
    }

    pub fn tracker(&self) -> &PostTracker {
        &self.tracker
    }

    pub fn queue(&self) -> &PostQueue {
        &self.queue
    }

    pub fn cooldowns(&self) -> &CooldownBook {
        &self.cooldowns
    }

    /// Run a single publication cycle over every source post
    pub async fn run_once(&mut self) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport::default();

        let all_files = self.list_posts().await?;
        tracing::info!(count = all_files.len(), dry_run = self.config.dry_run, "Found posts");

        if !self.config.dry_run {
            self.cooldowns.clear_expired().await?;
        }

        let needs = self.tracker.unpublished_files(&all_files);
        let candidates = match self.config.mode {
            PublishMode::Immediate => needs,
            PublishMode::Scheduled => {
                report.scheduled = self.schedule_needs(&needs, None).await?;
                if !self.config.dry_run {
                    self.reconcile_queue().await?;
                }
                self.ready_candidates(&needs)
            }
        };

        let publishers = self.publishers.clone();
        for publisher in publishers {
            let platform = publisher.platform();
            if !publisher.is_enabled() {
                tracing::debug!(platform = %platform, "Publisher disabled");
                continue;
            }

            if let Some(cooldown) = self.cooldowns.active(platform) {
                tracing::warn!(
                    platform = %platform,
                    until = %cooldown.until,
                    reason = %cooldown.reason,
                    "Skipping platform on cooldown"
                );
                report.skipped_platforms.push(platform.to_string());
                continue;
            }

            let files = candidates.get(platform).cloned().unwrap_or_default();
            if files.is_empty() {
                tracing::info!(platform = %platform, "Nothing to publish");
                continue;
            }

            self.publish_platform(publisher.as_ref(), &files, &mut report)
                .await?;
        }

        if !self.config.dry_run {
            report.cleaned = self.queue.clean(self.config.clean_after_days).await?;
        }

        self.log_status_report();
        tracing::info!(
            attempts = report.attempts.len(),
            published = report.published_count(),
            failed = report.failure_count(),
            skipped_platforms = ?report.skipped_platforms,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Queue every unpublished post that is not already queued.
    ///
    /// Without `at` each post goes to the next weekly slot.
    pub async fn schedule_unpublished(
        &mut self,
        at: Option<OffsetDateTime>,
    ) -> Result<Vec<ScheduledPost>, CycleError> {
        let all_files = self.list_posts().await?;
        let needs = self.tracker.unpublished_files(&all_files);
        self.schedule_needs(&needs, at).await
    }

    async fn list_posts(&self) -> Result<BTreeSet<String>, CycleError> {
        self.posts
            .list_posts()
            .await
            .map_err(|e| CycleError::Source(e.to_string()))
    }

    fn enabled_platforms(&self) -> Vec<String> {
        self.publishers
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.platform().to_string())
            .collect()
    }

    async fn schedule_needs(
        &mut self,
        needs: &BTreeMap<String, BTreeSet<String>>,
        at: Option<OffsetDateTime>,
    ) -> Result<Vec<ScheduledPost>, CycleError> {
        // file -> platforms still needed, in publisher order
        let mut per_file: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for platform in self.enabled_platforms() {
            let Some(files) = needs.get(&platform) else {
                continue;
            };
            for file in files {
                per_file
                    .entry(file.clone())
                    .or_default()
                    .push(platform.clone());
            }
        }

        let mut scheduled = Vec::new();
        for (file, platforms) in per_file {
            if self.queue.is_queued(&file) {
                continue;
            }

            let scheduled_time = if self.config.dry_run {
                let at = at.unwrap_or_else(|| self.queue.next_slot());
                tracing::info!(file = %file, platforms = ?platforms, scheduled_time = %at, "[DRY RUN] Would schedule");
                at
            } else {
                self.queue.schedule(&file, &platforms, at).await?
            };

            scheduled.push(ScheduledPost {
                file,
                platforms,
                scheduled_time,
            });
        }

        Ok(scheduled)
    }

    /// Drop platforms from ready items that were published outside the queue
    async fn reconcile_queue(&mut self) -> Result<(), CycleError> {
        for item in self.queue.ready_items() {
            for platform in &item.platforms {
                if self.tracker.is_platform_published(&item.file, platform) {
                    tracing::debug!(file = %item.file, platform = %platform, "Already published, completing queue entry");
                    self.queue.mark_completed(&item.file, platform).await?;
                }
            }
        }
        Ok(())
    }

    fn ready_candidates(
        &self,
        needs: &BTreeMap<String, BTreeSet<String>>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let ready = self.queue.ready_items();
        tracing::info!(count = ready.len(), "Queue items ready");

        needs
            .iter()
            .map(|(platform, files)| {
                let selected = files
                    .iter()
                    .filter(|file| {
                        ready
                            .iter()
                            .any(|item| item.file == **file && item.platforms.contains(platform))
                    })
                    .cloned()
                    .collect();
                (platform.clone(), selected)
            })
            .collect()
    }

    async fn publish_platform(
        &mut self,
        publisher: &dyn Publisher,
        files: &BTreeSet<String>,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let platform = publisher.platform();
        let delay = self.config.delay_for(platform);
        tracing::info!(platform = %platform, count = files.len(), "Publishing");

        for (index, file) in files.iter().enumerate() {
            let post = match self.posts.convert(file).await {
                Ok(post) => post,
                Err(error) => {
                    tracing::error!(file = %file, platform = %platform, error = %error, "Conversion failed");
                    report.push(
                        file,
                        platform,
                        AttemptOutcome::ConversionFailed {
                            error: error.to_string(),
                        },
                    );
                    continue;
                }
            };

            if self.config.dry_run {
                tracing::info!(
                    file = %file,
                    platform = %platform,
                    title = %post.metadata.title,
                    tags = ?post.metadata.tags,
                    "[DRY RUN] Would publish"
                );
                report.push(file, platform, AttemptOutcome::DryRun);
                continue;
            }

            self.tracker
                .update_platform_status(file, platform, AttemptStatus::InProgress, None)
                .await?;

            match self.publish_with_retry(publisher, &post).await {
                Ok(PublishResult { url, platform_id }) => {
                    self.tracker
                        .mark_platform_published(file, platform, &url, platform_id.as_deref())
                        .await?;
                    self.queue.mark_completed(file, platform).await?;
                    report.push(file, platform, AttemptOutcome::Published { url });

                    if index + 1 < files.len() && !delay.is_zero() {
                        tracing::debug!(platform = %platform, delay_secs = delay.as_secs(), "Pausing between posts");
                        sleep(delay).await;
                    }
                }
                Err(PublishError::RateLimited { retry_after }) => {
                    let message = PublishError::RateLimited { retry_after }.to_string();
                    self.tracker
                        .update_platform_status(
                            file,
                            platform,
                            AttemptStatus::RateLimited,
                            Some(&message),
                        )
                        .await?;
                    let until = self
                        .cooldowns
                        .start(
                            platform,
                            retry_after.unwrap_or(self.config.cooldown),
                            &message,
                        )
                        .await?;
                    report.push(file, platform, AttemptOutcome::RateLimited { until });
                    tracing::warn!(
                        platform = %platform,
                        remaining = files.len() - index - 1,
                        "Rate limited, deferring remaining posts"
                    );
                    break;
                }
                Err(PublishError::Duplicate(message)) => {
                    tracing::warn!(file = %file, platform = %platform, message = %message, "Platform already has this post");
                    self.tracker
                        .mark_platform_duplicate(file, platform, Some(&message))
                        .await?;
                    self.queue.mark_completed(file, platform).await?;
                    report.push(file, platform, AttemptOutcome::Duplicate { message });
                }
                Err(error) => {
                    tracing::error!(file = %file, platform = %platform, error = %error, "Failed to publish");
                    let message = error.to_string();
                    self.tracker
                        .update_platform_status(file, platform, AttemptStatus::Error, Some(&message))
                        .await?;
                    report.push(
                        file,
                        platform,
                        AttemptOutcome::Failed {
                            error: message,
                            retryable: error.is_retryable(),
                        },
                    );
                }
            }
        }

        Ok(())
    }

    async fn publish_with_retry(
        &self,
        publisher: &dyn Publisher,
        post: &ConvertedPost,
    ) -> Result<PublishResult, PublishError> {
        let mut retries = 0;
        loop {
            match publisher.publish(post).await {
                Err(error) if error.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        file = %post.original_file,
                        platform = %publisher.platform(),
                        retry = retries,
                        max_retries = self.config.max_retries,
                        error = %error,
                        "Publish failed, retrying"
                    );
                    if !self.config.retry_delay.is_zero() {
                        sleep(self.config.retry_delay).await;
                    }
                }
                result => return result,
            }
        }
    }

    fn log_status_report(&self) {
        let tracking = serde_json::to_string(self.tracker.status_report()).unwrap_or_default();
        let queue = serde_json::to_string(&self.queue.queue_status()).unwrap_or_default();
        tracing::info!(tracking = %tracking, queue = %queue, "Status report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueStatus;
    use crate::schedule::WeeklySchedule;
    use crate::testing::{FakePosts, ManualClock, MemoryStore, ScriptedPublisher};
    use serde_json::json;
    use time::macros::datetime;

    struct Harness {
        tracking: Arc<MemoryStore>,
        queue: Arc<MemoryStore>,
        cooldowns: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tracking: Arc::new(MemoryStore::new()),
                queue: Arc::new(MemoryStore::new()),
                cooldowns: Arc::new(MemoryStore::new()),
                // Wednesday
                clock: Arc::new(ManualClock::at(datetime!(2024-05-15 10:00 UTC))),
            }
        }

        fn saves(&self) -> usize {
            self.tracking.save_count() + self.queue.save_count() + self.cooldowns.save_count()
        }

        async fn cycle(
            &self,
            posts: FakePosts,
            publishers: &[Arc<ScriptedPublisher>],
            config: CycleConfig,
        ) -> PublishCycle {
            let publishers: Vec<Arc<dyn Publisher>> = publishers
                .iter()
                .map(|p| p.clone() as Arc<dyn Publisher>)
                .collect();
            let platforms = publishers
                .iter()
                .map(|p| p.platform().to_string())
                .collect();

            let tracker =
                PostTracker::open(self.tracking.clone(), platforms, self.clock.clone()).await;
            let queue = PostQueue::open(
                self.queue.clone(),
                WeeklySchedule::default(),
                self.clock.clone(),
            )
            .await;
            let cooldowns = CooldownBook::open(self.cooldowns.clone(), self.clock.clone()).await;

            PublishCycle::new(
                Arc::new(posts),
                publishers,
                tracker,
                queue,
                cooldowns,
                config,
            )
        }
    }

    fn fast_config() -> CycleConfig {
        CycleConfig {
            retry_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn outcomes(report: &CycleReport, platform: &str) -> Vec<(String, AttemptOutcome)> {
        report
            .attempts
            .iter()
            .filter(|a| a.platform == platform)
            .map(|a| (a.file.clone(), a.outcome.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_immediate_cycle_publishes_everything_once() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let devto = Arc::new(ScriptedPublisher::new("devto"));
        let mut cycle = harness
            .cycle(
                FakePosts::new(&["a.md", "b.md"]),
                &[medium.clone(), devto.clone()],
                fast_config(),
            )
            .await;

        let report = cycle.run_once().await.unwrap();
        assert_eq!(report.published_count(), 4);
        assert_eq!(medium.calls(), vec!["a.md", "b.md"]);
        assert!(cycle.tracker().is_platform_published("b.md", "devto"));

        let record = cycle.tracker().record("a.md").unwrap();
        let medium_entry = record.platform("medium").unwrap();
        assert_eq!(medium_entry.url.as_deref(), Some("https://medium.example/a.md"));
        assert!(medium_entry.status.is_none());

        let report = cycle.run_once().await.unwrap();
        assert!(report.attempts.is_empty());
        assert_eq!(medium.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let harness = Harness::new();
        let medium = Arc::new(
            ScriptedPublisher::new("medium")
                .respond("a.md", Err(PublishError::Transient("502".into()))),
        );
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[medium.clone()], fast_config())
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.published_count(), 1);
        assert_eq!(medium.calls(), vec!["a.md", "a.md"]);
    }

    #[tokio::test]
    async fn test_retries_exhausted_records_error() {
        let harness = Harness::new();
        let mut medium = ScriptedPublisher::new("medium");
        for _ in 0..3 {
            medium = medium.respond("a.md", Err(PublishError::Transient("timeout".into())));
        }
        let medium = Arc::new(medium);
        let config = CycleConfig {
            max_retries: 2,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md", "b.md"]), &[medium.clone()], config)
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(medium.calls(), vec!["a.md", "a.md", "a.md", "b.md"]);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.published_count(), 1);
        let entry = cycle
            .tracker()
            .record("a.md")
            .unwrap()
            .platform("medium")
            .unwrap();
        assert_eq!(entry.status, Some(AttemptStatus::Error));
        assert!(!cycle.tracker().is_platform_published("a.md", "medium"));
    }

    #[tokio::test]
    async fn test_rate_limit_defers_platform_until_cooldown_expires() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let devto = Arc::new(ScriptedPublisher::new("devto").respond(
            "a.md",
            Err(PublishError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            }),
        ));
        let mut cycle = harness
            .cycle(
                FakePosts::new(&["a.md", "b.md"]),
                &[medium.clone(), devto.clone()],
                fast_config(),
            )
            .await;

        let report = cycle.run_once().await.unwrap();
        assert_eq!(devto.calls(), vec!["a.md"]);
        assert_eq!(medium.calls(), vec!["a.md", "b.md"]);
        assert_eq!(
            outcomes(&report, "devto"),
            vec![(
                "a.md".to_string(),
                AttemptOutcome::RateLimited {
                    until: datetime!(2024-05-15 10:01 UTC)
                }
            )]
        );
        let entry = cycle
            .tracker()
            .record("a.md")
            .unwrap()
            .platform("devto")
            .unwrap();
        assert_eq!(entry.status, Some(AttemptStatus::RateLimited));

        let report = cycle.run_once().await.unwrap();
        assert_eq!(report.skipped_platforms, vec!["devto"]);
        assert_eq!(devto.calls().len(), 1);

        harness.clock.advance(time::Duration::seconds(61));
        let report = cycle.run_once().await.unwrap();
        assert_eq!(report.published_count(), 2);
        assert!(cycle.cooldowns().all().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_without_retry_after_uses_configured_cooldown() {
        let harness = Harness::new();
        let devto = Arc::new(ScriptedPublisher::new("devto").respond(
            "a.md",
            Err(PublishError::RateLimited { retry_after: None }),
        ));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[devto], fast_config())
            .await;

        cycle.run_once().await.unwrap();

        let cooldown = cycle.cooldowns().active("devto").unwrap();
        assert_eq!(cooldown.until, datetime!(2024-05-15 11:00 UTC));
    }

    #[tokio::test]
    async fn test_huge_retry_after_is_capped() {
        let harness = Harness::new();
        let devto = Arc::new(ScriptedPublisher::new("devto").respond(
            "a.md",
            Err(PublishError::RateLimited {
                retry_after: Some(Duration::from_secs(99_999_999_999_999)),
            }),
        ));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[devto], fast_config())
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(
            report.attempts[0].outcome,
            AttemptOutcome::RateLimited {
                until: datetime!(2024-05-22 10:00 UTC)
            }
        );
        assert!(cycle.cooldowns().active("devto").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_delay_only_between_files() {
        let delayed = || CycleConfig {
            retry_delay: Duration::ZERO,
            platform_delays: HashMap::from([("medium".to_string(), Duration::from_secs(30))]),
            ..Default::default()
        };

        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md", "b.md"]), &[medium.clone()], delayed())
            .await;

        let started = tokio::time::Instant::now();
        let report = cycle.run_once().await.unwrap();
        assert_eq!(report.published_count(), 2);
        assert_eq!(started.elapsed(), delayed().delay_for("medium"));

        let harness = Harness::new();
        let mut cycle = harness
            .cycle(FakePosts::new(&["only.md"]), &[medium], delayed())
            .await;

        let started = tokio::time::Instant::now();
        cycle.run_once().await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_only_storage_errors_are_fatal() {
        assert!(!CycleError::Source("gone".into()).is_fatal());
        assert!(
            CycleError::Queue(QueueError {
                operation: "scheduling".to_string(),
                source: crate::ports::StorageError::Serialization("disk full".into()),
            })
            .is_fatal()
        );
    }

    #[tokio::test]
    async fn test_duplicate_is_terminal() {
        let harness = Harness::new();
        let devto = Arc::new(ScriptedPublisher::new("devto").respond(
            "a.md",
            Err(PublishError::Duplicate("Canonical url has already been taken".into())),
        ));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[devto.clone()], fast_config())
            .await;

        let report = cycle.run_once().await.unwrap();
        assert!(matches!(
            report.attempts[0].outcome,
            AttemptOutcome::Duplicate { .. }
        ));
        assert!(cycle.tracker().is_platform_published("a.md", "devto"));

        cycle.run_once().await.unwrap();
        assert_eq!(devto.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_moves_to_next_file() {
        let harness = Harness::new();
        let medium = Arc::new(
            ScriptedPublisher::new("medium")
                .respond("a.md", Err(PublishError::Auth("bad token".into()))),
        );
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md", "b.md"]), &[medium.clone()], fast_config())
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(medium.calls(), vec!["a.md", "b.md"]);
        assert_eq!(
            outcomes(&report, "medium")[0].1,
            AttemptOutcome::Failed {
                error: "Authentication failed: bad token".to_string(),
                retryable: false
            }
        );
        assert!(cycle.tracker().is_platform_published("b.md", "medium"));
    }

    #[tokio::test]
    async fn test_conversion_failure_records_nothing() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let mut cycle = harness
            .cycle(
                FakePosts::new(&["bad.md", "good.md"]).with_broken("bad.md"),
                &[medium.clone()],
                fast_config(),
            )
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(medium.calls(), vec!["good.md"]);
        assert_eq!(report.failure_count(), 1);
        assert!(cycle.tracker().record("bad.md").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_calls_nothing_and_writes_nothing() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let devto = Arc::new(ScriptedPublisher::new("devto"));
        let config = CycleConfig {
            dry_run: true,
            mode: PublishMode::Scheduled,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(
                FakePosts::new(&["a.md"]),
                &[medium.clone(), devto.clone()],
                config,
            )
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.scheduled.len(), 1);
        assert_eq!(report.scheduled[0].scheduled_time, datetime!(2024-05-16 13:00 UTC));
        assert!(medium.calls().is_empty());
        assert!(devto.calls().is_empty());
        assert_eq!(harness.saves(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_immediate_reports_would_publish() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let config = CycleConfig {
            dry_run: true,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md", "b.md"]), &[medium.clone()], config)
            .await;

        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.attempts.len(), 2);
        assert!(
            report
                .attempts
                .iter()
                .all(|a| a.outcome == AttemptOutcome::DryRun)
        );
        assert!(medium.calls().is_empty());
        assert_eq!(harness.saves(), 0);
    }

    #[tokio::test]
    async fn test_scheduled_mode_waits_for_slot() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let devto = Arc::new(ScriptedPublisher::new("devto"));
        let config = CycleConfig {
            mode: PublishMode::Scheduled,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(
                FakePosts::new(&["a.md"]),
                &[medium.clone(), devto.clone()],
                config,
            )
            .await;

        let report = cycle.run_once().await.unwrap();
        assert_eq!(
            report.scheduled,
            vec![ScheduledPost {
                file: "a.md".to_string(),
                platforms: vec!["medium".to_string(), "devto".to_string()],
                scheduled_time: datetime!(2024-05-16 13:00 UTC),
            }]
        );
        assert!(report.attempts.is_empty());

        harness.clock.set(datetime!(2024-05-16 13:00 UTC));
        let report = cycle.run_once().await.unwrap();
        assert!(report.scheduled.is_empty());
        assert_eq!(report.published_count(), 2);

        let item = cycle.queue().item("a.md").unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
    }

    #[tokio::test]
    async fn test_scheduled_mode_completes_entries_published_elsewhere() {
        let mut harness = Harness::new();
        harness.tracking = Arc::new(MemoryStore::with_document(json!({
            "a.md": {
                "first_published_at": "2024-05-14T10:00:00Z",
                "platforms": {"medium": {"url": "https://medium.example/a.md"}}
            }
        })));
        harness.queue = Arc::new(MemoryStore::with_document(json!({
            "a.md": {
                "added_at": "2024-05-14T10:00:00Z",
                "scheduled_time": "2024-05-15T09:00:00Z",
                "platforms": ["medium"],
                "status": "queued"
            }
        })));
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let config = CycleConfig {
            mode: PublishMode::Scheduled,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[medium.clone()], config)
            .await;

        let report = cycle.run_once().await.unwrap();

        assert!(report.attempts.is_empty());
        assert!(medium.calls().is_empty());
        assert_eq!(
            cycle.queue().item("a.md").unwrap().status,
            QueueStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_cycle() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[medium.clone()], fast_config())
            .await;

        harness.tracking.fail_saves(true);
        let error = cycle.run_once().await.unwrap_err();

        assert!(matches!(error, CycleError::Tracking(_)));
        assert!(medium.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_publisher_is_skipped() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::disabled("medium"));
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[medium.clone()], fast_config())
            .await;

        let report = cycle.run_once().await.unwrap();

        assert!(report.attempts.is_empty());
        assert!(medium.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_runs_each_cycle() {
        let harness = Harness::new();
        let medium = Arc::new(ScriptedPublisher::new("medium"));
        let config = CycleConfig {
            mode: PublishMode::Scheduled,
            ..fast_config()
        };
        let mut cycle = harness
            .cycle(FakePosts::new(&["a.md"]), &[medium.clone()], config)
            .await;
        cycle
            .schedule_unpublished(Some(datetime!(2024-05-15 10:00 UTC)))
            .await
            .unwrap();
        cycle.run_once().await.unwrap();
        assert!(cycle.queue().item("a.md").is_some());

        harness.clock.advance(time::Duration::days(8));
        let report = cycle.run_once().await.unwrap();

        assert_eq!(report.cleaned, 1);
        assert!(cycle.queue().item("a.md").is_none());
    }
}
