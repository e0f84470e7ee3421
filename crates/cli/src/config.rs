//! Configuration loading and management

use anyhow::{Context, Result};
use crosspost_adapters::medium::MediumPublishStatus;
use crosspost_domain::schedule::parse_weekday;
use crosspost_domain::{PublishMode, ScheduleError, ScheduleSlot, WeeklySchedule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "./crosspost.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub medium: MediumConfig,

    #[serde(default)]
    pub devto: DevToConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_posts_dir")]
    pub posts_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding `.tracking/` and `.queue/`
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub mode: PublishMode,

    #[serde(default = "default_clean_after_days")]
    pub clean_after_days: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Cooldown after a rate limit without Retry-After
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub hour: u8,
    pub weekdays: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_medium_token_env")]
    pub token_env: String,

    #[serde(default = "default_medium_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub publish_status: MediumPublishStatus,

    #[serde(default = "default_medium_delay")]
    pub delay_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevToConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_devto_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_devto_api_base")]
    pub api_base: String,

    /// Publish immediately instead of creating a draft
    #[serde(default)]
    pub published: bool,

    #[serde(default = "default_devto_delay")]
    pub delay_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_posts_dir() -> PathBuf {
    PathBuf::from("./posts")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./dist")
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_clean_after_days() -> u32 {
    7
}

fn default_poll_interval() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_cooldown() -> u64 {
    3600
}

fn default_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig {
            hour: 13,
            weekdays: vec!["tue".to_string(), "thu".to_string()],
        },
        SlotConfig {
            hour: 15,
            weekdays: vec!["sat".to_string()],
        },
    ]
}

fn default_true() -> bool {
    true
}

fn default_medium_token_env() -> String {
    "MEDIUM_TOKEN".to_string()
}

fn default_medium_api_base() -> String {
    crosspost_adapters::medium::DEFAULT_API_BASE.to_string()
}

fn default_medium_delay() -> u64 {
    5
}

fn default_devto_api_key_env() -> String {
    "DEVTO_API_KEY".to_string()
}

fn default_devto_api_base() -> String {
    crosspost_adapters::devto::DEFAULT_API_BASE.to_string()
}

fn default_devto_delay() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            posts_dir: default_posts_dir(),
            output_dir: default_output_dir(),
            project_root: default_project_root(),
            dry_run: false,
            mode: PublishMode::default(),
            clean_after_days: default_clean_after_days(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            cooldown_secs: default_cooldown(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
        }
    }
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_env: default_medium_token_env(),
            api_base: default_medium_api_base(),
            publish_status: MediumPublishStatus::default(),
            delay_secs: default_medium_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for DevToConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_devto_api_key_env(),
            api_base: default_devto_api_base(),
            published: false,
            delay_secs: default_devto_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ScheduleConfig {
    /// Validate and build the weekly schedule
    pub fn to_schedule(&self) -> Result<WeeklySchedule> {
        let slots = self
            .slots
            .iter()
            .map(|slot| -> Result<ScheduleSlot, ScheduleError> {
                let weekdays = slot
                    .weekdays
                    .iter()
                    .map(|day| parse_weekday(day))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ScheduleSlot::new(slot.hour, weekdays))
            })
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid [schedule] weekday")?;

        WeeklySchedule::new(slots).context("Invalid [schedule]")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Legacy variables act as defaults below file and CROSSPOST__ values
        if let Ok(dir) = std::env::var("MARKDOWN_DIR") {
            builder = builder.set_default("general.posts_dir", dir)?;
        }
        if let Ok(dir) = std::env::var("HTML_OUTPUT_DIR") {
            builder = builder.set_default("general.output_dir", dir)?;
        }

        // Try default config path if none specified
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CROSSPOST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn tracking_path(&self) -> PathBuf {
        self.general
            .project_root
            .join(".tracking")
            .join("published_posts.json")
    }

    pub fn cooldowns_path(&self) -> PathBuf {
        self.general.project_root.join(".tracking").join("cooldowns.json")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.general.project_root.join(".queue").join("post_queue.json")
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry.retry_delay_secs)
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# crosspost configuration

[general]
posts_dir = "./posts"          # also MARKDOWN_DIR
output_dir = "./dist"          # also HTML_OUTPUT_DIR, used by `convert`
project_root = "."             # holds .tracking/ and .queue/
dry_run = false
mode = "immediate"             # immediate, scheduled
clean_after_days = 7
poll_interval_secs = 3600      # used by `run --watch`

[retry]
max_retries = 3
retry_delay_secs = 5
cooldown_secs = 3600           # applied on 429 without Retry-After

# Weekly slots (UTC) used in scheduled mode and by `queue`
[[schedule.slots]]
hour = 13
weekdays = ["tue", "thu"]

[[schedule.slots]]
hour = 15
weekdays = ["sat"]

[medium]
enabled = true
token_env = "MEDIUM_TOKEN"
api_base = "https://api.medium.com/v1"
publish_status = "draft"       # draft, public, unlisted
delay_secs = 5
timeout_secs = 30

[devto]
enabled = true
api_key_env = "DEVTO_API_KEY"
api_base = "https://dev.to/api"
published = false
delay_secs = 30
timeout_secs = 30
"#
        .to_string()
    }
}
