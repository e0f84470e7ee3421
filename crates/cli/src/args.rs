//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use crosspost_domain::PublishMode;
use std::path::PathBuf;

/// crosspost: publish markdown posts to Medium and Dev.to
#[derive(Parser, Debug)]
#[command(name = "crosspost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish unpublished posts to every enabled platform
    Run(RunArgs),

    /// Schedule every unpublished post on the weekly queue
    Queue(QueueArgs),

    /// Show publication and queue status
    Status(StatusArgs),

    /// Remove old completed queue entries
    Clean(CleanArgs),

    /// Convert posts to JSON in the output directory
    Convert(ConvertArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Immediate,
    Scheduled,
}

impl From<ModeArg> for PublishMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Immediate => PublishMode::Immediate,
            ModeArg::Scheduled => PublishMode::Scheduled,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run in dry-run mode (no publishing, no state changes)
    #[arg(long)]
    pub dry_run: bool,

    /// Keep running cycles every poll interval until Ctrl-C
    #[arg(long)]
    pub watch: bool,

    /// Override the configured publish mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override posts directory
    #[arg(long)]
    pub posts_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Schedule at this RFC 3339 time instead of the next weekly slot
    #[arg(long)]
    pub at: Option<String>,

    /// Override posts directory
    #[arg(long)]
    pub posts_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove completed entries older than this many days
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Override posts directory
    #[arg(long)]
    pub posts_dir: Option<PathBuf>,

    /// Override output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./crosspost.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
