//! Subcommand implementations and the wiring they share

pub mod clean;
pub mod config;
pub mod convert;
pub mod doctor;
pub mod queue;
pub mod run;
pub mod status;

use anyhow::Result;
use crosspost_adapters::{
    devto::DevToPublisher,
    medium::MediumPublisher,
    posts::FsPostRepository,
    state::{InMemoryDocumentStore, JsonFileStore},
};
use crosspost_domain::{
    Clock, DocumentStore, PublishMode, Publisher, SystemClock,
    usecases::{CooldownBook, CycleConfig, PostQueue, PostTracker, PublishCycle},
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

/// Read a secret from the environment variable named in config.
///
/// Returns `None` (and logs why) when the variable is unset or empty.
pub(crate) fn load_api_key(env_var: &str, platform: &str) -> Option<SecretString> {
    if env_var.trim().is_empty() {
        tracing::warn!(platform = %platform, "No credential env var configured");
        return None;
    }

    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Some(SecretString::new(key.into())),
        Ok(_) => {
            tracing::warn!(platform = %platform, env_var = %env_var, "Credential env var is empty");
            None
        }
        Err(_) => {
            tracing::warn!(platform = %platform, env_var = %env_var, "Credential env var not set");
            None
        }
    }
}

/// Publishers in publishing order; missing credentials disable a platform
pub(crate) fn build_publishers(config: &AppConfig) -> Vec<Arc<dyn Publisher>> {
    let medium: Arc<dyn Publisher> = match config
        .medium
        .enabled
        .then(|| load_api_key(&config.medium.token_env, "medium"))
        .flatten()
    {
        Some(token) => Arc::new(MediumPublisher::with_base_url(
            token,
            config.medium.api_base.clone(),
            config.medium.publish_status,
            Duration::from_secs(config.medium.timeout_secs),
            true,
        )),
        None => Arc::new(MediumPublisher::disabled()),
    };

    let devto: Arc<dyn Publisher> = match config
        .devto
        .enabled
        .then(|| load_api_key(&config.devto.api_key_env, "devto"))
        .flatten()
    {
        Some(api_key) => Arc::new(DevToPublisher::with_base_url(
            api_key,
            config.devto.api_base.clone(),
            config.devto.published,
            Duration::from_secs(config.devto.timeout_secs),
            true,
        )),
        None => Arc::new(DevToPublisher::disabled()),
    };

    vec![medium, devto]
}

pub(crate) fn platform_names(publishers: &[Arc<dyn Publisher>]) -> Vec<String> {
    publishers.iter().map(|p| p.platform().to_string()).collect()
}

/// The three state documents of a project
pub(crate) struct Stores {
    pub tracking: Arc<dyn DocumentStore>,
    pub queue: Arc<dyn DocumentStore>,
    pub cooldowns: Arc<dyn DocumentStore>,
}

impl Stores {
    /// File-backed stores under the project root
    pub(crate) fn open(config: &AppConfig) -> Self {
        Self {
            tracking: Arc::new(JsonFileStore::new(config.tracking_path())),
            queue: Arc::new(JsonFileStore::new(config.queue_path())),
            cooldowns: Arc::new(JsonFileStore::new(config.cooldowns_path())),
        }
    }

    /// In-memory copies of the current files; nothing is ever written to disk
    pub(crate) async fn snapshot(config: &AppConfig) -> Self {
        Self {
            tracking: snapshot_store("tracking", config.tracking_path()).await,
            queue: snapshot_store("queue", config.queue_path()).await,
            cooldowns: snapshot_store("cooldowns", config.cooldowns_path()).await,
        }
    }
}

async fn snapshot_store(label: &str, path: PathBuf) -> Arc<dyn DocumentStore> {
    let (document, _) = JsonFileStore::new(path).read().await;
    Arc::new(InMemoryDocumentStore::with_document(
        label,
        document.unwrap_or_default(),
    ))
}

/// Everything a publishing command needs
pub(crate) struct CycleOptions<'a> {
    pub posts_dir: &'a Path,
    pub mode: PublishMode,
    pub dry_run: bool,
}

pub(crate) async fn build_cycle(config: &AppConfig, options: CycleOptions<'_>) -> Result<PublishCycle> {
    let schedule = config.schedule.to_schedule()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let stores = if options.dry_run {
        Stores::snapshot(config).await
    } else {
        Stores::open(config)
    };

    let publishers = build_publishers(config);
    let tracker = PostTracker::open(stores.tracking, platform_names(&publishers), clock.clone()).await;
    let queue = PostQueue::open(stores.queue, schedule, clock.clone()).await;
    let cooldowns = CooldownBook::open(stores.cooldowns, clock).await;

    let cycle_config = CycleConfig {
        mode: options.mode,
        dry_run: options.dry_run,
        max_retries: config.retry.max_retries,
        retry_delay: config.retry_delay(),
        cooldown: Duration::from_secs(config.retry.cooldown_secs),
        clean_after_days: config.general.clean_after_days,
        platform_delays: HashMap::from([
            (
                "medium".to_string(),
                Duration::from_secs(config.medium.delay_secs),
            ),
            (
                "devto".to_string(),
                Duration::from_secs(config.devto.delay_secs),
            ),
        ]),
    };

    Ok(PublishCycle::new(
        Arc::new(FsPostRepository::new(options.posts_dir)),
        publishers,
        tracker,
        queue,
        cooldowns,
        cycle_config,
    ))
}
