//! Fakes shared by the domain unit tests

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;
use time::OffsetDateTime;

use crate::model::{ContentFormat, ConvertedPost, PostMetadata};
use crate::ports::{
    Clock, ConversionError, Document, DocumentStore, PostRepository, PublishError, PublishResult,
    Publisher, SourceError, StorageError,
};

pub struct MemoryStore {
    document: Mutex<Document>,
    fail: Mutex<bool>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            document: Mutex::new(Document::new()),
            fail: Mutex::new(false),
            saves: Mutex::new(0),
        }
    }

    pub fn with_document(value: serde_json::Value) -> Self {
        let store = Self::new();
        if let serde_json::Value::Object(map) = value {
            *store.document.lock().unwrap() = map;
        }
        store
    }

    pub fn document(&self) -> Document {
        self.document.lock().unwrap().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Document {
        self.document()
    }

    async fn save(&self, document: &Document) -> Result<(), StorageError> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::Io {
                path: "memory".to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        *self.document.lock().unwrap() = document.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: time::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

/// Post repository backed by a fixed list; files listed in `broken` fail
/// conversion
pub struct FakePosts {
    pub files: BTreeSet<String>,
    pub broken: BTreeSet<String>,
}

impl FakePosts {
    pub fn new(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| f.to_string()).collect(),
            broken: BTreeSet::new(),
        }
    }

    pub fn with_broken(mut self, file: &str) -> Self {
        self.broken.insert(file.to_string());
        self
    }
}

#[async_trait]
impl PostRepository for FakePosts {
    async fn list_posts(&self) -> Result<BTreeSet<String>, SourceError> {
        Ok(self.files.clone())
    }

    async fn convert(&self, file: &str) -> Result<ConvertedPost, ConversionError> {
        if self.broken.contains(file) {
            return Err(ConversionError::new(file, "missing title"));
        }
        Ok(ConvertedPost {
            metadata: PostMetadata {
                title: format!("Title of {}", file),
                description: "A post".to_string(),
                tags: vec!["rust".to_string()],
                canonical_url: None,
                extra: BTreeMap::new(),
            },
            content: "Body".to_string(),
            content_format: ContentFormat::Markdown,
            original_file: file.to_string(),
        })
    }
}

/// Publisher answering from a per-file script; unscripted files succeed
pub struct ScriptedPublisher {
    platform: &'static str,
    enabled: bool,
    script: Mutex<BTreeMap<String, VecDeque<Result<PublishResult, PublishError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPublisher {
    pub fn new(platform: &'static str) -> Self {
        Self {
            platform,
            enabled: true,
            script: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn disabled(platform: &'static str) -> Self {
        Self {
            enabled: false,
            ..Self::new(platform)
        }
    }

    pub fn respond(self, file: &str, response: Result<PublishResult, PublishError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(file.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for ScriptedPublisher {
    async fn publish(&self, post: &ConvertedPost) -> Result<PublishResult, PublishError> {
        let file = post.original_file.clone();
        self.calls.lock().unwrap().push(file.clone());

        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&file)
            .and_then(|responses| responses.pop_front());

        scripted.unwrap_or_else(|| {
            Ok(PublishResult {
                url: format!("https://{}.example/{}", self.platform, file),
                platform_id: Some(format!("{}-{}", self.platform, file)),
            })
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn platform(&self) -> &'static str {
        self.platform
    }
}
