//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Outcome of the most recent publish attempt that did not yield a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// An attempt was started and has not been resolved
    InProgress,
    /// The attempt failed and is eligible for a later cycle
    Error,
    /// The platform throttled the attempt
    RateLimited,
    /// The platform already holds this content; never retried
    Duplicate,
}

/// Publication state of one post on one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPublication {
    /// Public URL, present once the platform accepted the post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Platform-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub published_at: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub last_updated_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AttemptStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl PlatformPublication {
    fn attempted(now: OffsetDateTime) -> Self {
        Self {
            url: None,
            platform_id: None,
            published_at: None,
            last_updated_at: Some(now),
            status: None,
            status_message: None,
        }
    }

    /// Whether the platform should be considered done for this post.
    /// A duplicate rejection is terminal even though it carries no URL.
    pub fn is_published(&self) -> bool {
        self.url.is_some() || self.status == Some(AttemptStatus::Duplicate)
    }
}

/// Durable per-file publication history across all platforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(with = "timestamp")]
    pub first_published_at: OffsetDateTime,
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformPublication>,
}

impl PostRecord {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            first_published_at: now,
            platforms: BTreeMap::new(),
        }
    }

    pub fn platform(&self, platform: &str) -> Option<&PlatformPublication> {
        self.platforms.get(platform)
    }

    /// Get the entry for a platform, creating an empty attempt entry if absent
    pub(crate) fn platform_entry(
        &mut self,
        platform: &str,
        now: OffsetDateTime,
    ) -> &mut PlatformPublication {
        self.platforms
            .entry(platform.to_string())
            .or_insert_with(|| PlatformPublication::attempted(now))
    }
}

/// Lifecycle state of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Completed,
}

/// Scheduling entry describing pending per-platform delivery for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(with = "timestamp")]
    pub added_at: OffsetDateTime,
    #[serde(with = "timestamp")]
    pub scheduled_time: OffsetDateTime,
    /// Platforms still pending, in scheduling order
    pub platforms: Vec<String>,
    pub status: QueueStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub completed_at: Option<OffsetDateTime>,
}

/// A queue item whose scheduled time has arrived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyItem {
    pub file: String,
    pub platforms: Vec<String>,
    #[serde(with = "timestamp")]
    pub queued_at: OffsetDateTime,
}

/// Flattened queue item for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub file: String,
    pub platforms: Vec<String>,
    #[serde(with = "timestamp")]
    pub scheduled_time: OffsetDateTime,
    #[serde(with = "timestamp")]
    pub added_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Full queue dump split by status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueReport {
    pub queued: Vec<QueueEntry>,
    pub completed: Vec<QueueEntry>,
}

/// Rate-limit cooldown for a platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    #[serde(with = "timestamp")]
    pub until: OffsetDateTime,
    #[serde(default)]
    pub reason: String,
}

/// Body format handed to the platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    Markdown,
    Html,
}

/// Frontmatter of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// Remaining frontmatter keys, passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A post ready to be handed to a publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedPost {
    pub metadata: PostMetadata,
    pub content: String,
    #[serde(default)]
    pub content_format: ContentFormat,
    /// Source file identifier, relative to the posts directory
    pub original_file: String,
}

/// How the cycle selects work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Publish everything that is still unpublished
    #[default]
    Immediate,
    /// Queue unpublished posts on the weekly schedule, publish only ready items
    Scheduled,
}

/// A file placed on the queue during a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPost {
    pub file: String,
    pub platforms: Vec<String>,
    pub scheduled_time: OffsetDateTime,
}

/// Result of one (file, platform) attempt within a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The platform accepted the post
    Published { url: String },
    /// The platform already has this content
    Duplicate { message: String },
    /// The platform throttled us; remaining files were deferred
    RateLimited { until: OffsetDateTime },
    /// Publishing failed
    Failed { error: String, retryable: bool },
    /// The source file could not be converted
    ConversionFailed { error: String },
    /// Dry run, nothing was sent
    DryRun,
}

/// One attempt within a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub file: String,
    pub platform: String,
    pub outcome: AttemptOutcome,
}

/// Summary of a full cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub attempts: Vec<AttemptRecord>,
    /// Platforms skipped because a cooldown was active
    pub skipped_platforms: Vec<String>,
    pub scheduled: Vec<ScheduledPost>,
    /// Completed queue items removed by cleanup
    pub cleaned: usize,
}

impl CycleReport {
    pub(crate) fn push(&mut self, file: &str, platform: &str, outcome: AttemptOutcome) {
        self.attempts.push(AttemptRecord {
            file: file.to_string(),
            platform: platform.to_string(),
            outcome,
        });
    }

    pub fn published_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::Published { .. }))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| {
                matches!(
                    a.outcome,
                    AttemptOutcome::Failed { .. } | AttemptOutcome::ConversionFailed { .. }
                )
            })
            .count()
    }
}

/// RFC 3339 timestamps on the way out; RFC 3339 or offset-less ISO 8601
/// (read as UTC) on the way in, so state written by older tooling still loads.
pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::format_description::well_known::Rfc3339;
    use time::macros::format_description;
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
        if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(value);
        }
        let naive = format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        );
        PrimitiveDateTime::parse(raw, naive).map(PrimitiveDateTime::assume_utc)
    }

    pub mod option {
        use super::parse;
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
        use time::OffsetDateTime;

        pub fn serialize<S: Serializer>(
            value: &Option<OffsetDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}
