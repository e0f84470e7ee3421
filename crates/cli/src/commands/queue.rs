//! Queue command - place every unpublished post on the weekly schedule

use anyhow::{Context, Result};
use crosspost_domain::PublishMode;
use std::path::PathBuf;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::args::QueueArgs;
use crate::commands::{CycleOptions, build_cycle};
use crate::config::AppConfig;

pub async fn execute(args: QueueArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let at = args
        .at
        .as_deref()
        .map(|raw| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .with_context(|| format!("Invalid --at time (expected RFC 3339): {}", raw))
        })
        .transpose()?;

    let posts_dir = args
        .posts_dir
        .clone()
        .unwrap_or_else(|| config.general.posts_dir.clone());

    let mut cycle = build_cycle(
        &config,
        CycleOptions {
            posts_dir: &posts_dir,
            mode: PublishMode::Scheduled,
            dry_run: config.general.dry_run,
        },
    )
    .await
    .context("Failed to set up queue")?;

    let scheduled = cycle
        .schedule_unpublished(at)
        .await
        .context("Failed to schedule posts")?;

    if scheduled.is_empty() {
        println!("No posts to schedule");
        return Ok(());
    }

    for post in &scheduled {
        let when = post
            .scheduled_time
            .format(&Rfc3339)
            .unwrap_or_else(|_| post.scheduled_time.to_string());
        println!("{} -> {} ({})", post.file, when, post.platforms.join(", "));
    }
    println!("Scheduled {} post(s)", scheduled.len());

    Ok(())
}
