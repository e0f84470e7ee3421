//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::ConvertedPost;

/// A JSON object document: string keys mapped to arbitrary values
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Error type for state persistence
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for a single persisted JSON document
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the document. Missing or unreadable state yields an empty
    /// document; failures are logged, never returned.
    async fn load(&self) -> Document;

    /// Durably replace the document
    async fn save(&self, document: &Document) -> Result<(), StorageError>;

    /// Human-readable location, for logs
    fn location(&self) -> String;
}

/// Error type for enumerating source posts
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Posts directory not found: {0}")]
    NotFound(String),
}

/// A source file could not be turned into a publishable post
#[derive(Debug, Clone, Error)]
#[error("Failed to convert {file}: {message}")]
pub struct ConversionError {
    pub file: String,
    pub message: String,
}

impl ConversionError {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Port for locating and converting source posts
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// List post identifiers, relative to the posts root
    async fn list_posts(&self) -> Result<BTreeSet<String>, SourceError>;

    /// Convert a post into platform-neutral content
    async fn convert(&self, file: &str) -> Result<ConvertedPost, ConversionError>;
}

/// Error type for publisher operations, classified where the response
/// status is known
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Rate limited, retry after: {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Duplicate content: {0}")]
    Duplicate(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Transient failure: {0}")]
    Transient(String),
    #[error("Rejected: {0}")]
    Permanent(String),
}

impl PublishError {
    /// Worth retrying within the same cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result of a successful publish operation
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    /// URL to the published content
    pub url: String,
    /// Platform-specific post ID
    pub platform_id: Option<String>,
}

/// Port for publishing a post to one platform
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a converted post
    async fn publish(&self, post: &ConvertedPost) -> Result<PublishResult, PublishError>;

    /// Check if this publisher is enabled
    fn is_enabled(&self) -> bool;

    /// Get the platform name (e.g., "medium", "devto")
    fn platform(&self) -> &'static str;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
