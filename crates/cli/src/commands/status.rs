//! Status command - report publication history, queue and cooldowns

use anyhow::Result;
use crosspost_domain::{
    AttemptStatus, Clock, Cooldown, PlatformPublication, PostRecord, QueueEntry, QueueReport,
    SystemClock,
    usecases::{CooldownBook, PostQueue, PostTracker},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::StatusArgs;
use crate::commands::{Stores, build_publishers, platform_names};
use crate::config::AppConfig;

#[derive(Serialize)]
struct StatusReport<'a> {
    posts: &'a BTreeMap<String, PostRecord>,
    queue: QueueReport,
    cooldowns: &'a BTreeMap<String, Cooldown>,
}

pub async fn execute(args: StatusArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Reading status never rewrites state files
    let stores = Stores::snapshot(&config).await;
    let platforms = platform_names(&build_publishers(&config));
    let tracker = PostTracker::open(stores.tracking, platforms, clock.clone()).await;
    let queue = PostQueue::open(stores.queue, config.schedule.to_schedule()?, clock.clone()).await;
    let cooldowns = CooldownBook::open(stores.cooldowns, clock).await;

    let report = StatusReport {
        posts: tracker.status_report(),
        queue: queue.queue_status(),
        cooldowns: cooldowns.all(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &StatusReport<'_>) {
    println!("Published posts");
    println!("===============");
    if report.posts.is_empty() {
        println!("  (none)");
    }
    for (file, record) in report.posts {
        println!("{}", file);
        for (platform, publication) in &record.platforms {
            println!("  {}: {}", platform, describe(publication));
        }
    }

    println!();
    println!("Queue");
    println!("=====");
    if report.queue.queued.is_empty() && report.queue.completed.is_empty() {
        println!("  (empty)");
    }
    for entry in &report.queue.queued {
        print_entry("queued", entry);
    }
    for entry in &report.queue.completed {
        print_entry("completed", entry);
    }

    if !report.cooldowns.is_empty() {
        println!();
        println!("Cooldowns");
        println!("=========");
        for (platform, cooldown) in report.cooldowns {
            println!("  {}: until {} ({})", platform, cooldown.until, cooldown.reason);
        }
    }
}

fn describe(publication: &PlatformPublication) -> String {
    if let Some(url) = &publication.url {
        return url.clone();
    }

    let status = match publication.status {
        Some(AttemptStatus::InProgress) => "in progress",
        Some(AttemptStatus::Error) => "error",
        Some(AttemptStatus::RateLimited) => "rate limited",
        Some(AttemptStatus::Duplicate) => "duplicate",
        None => "pending",
    };

    match &publication.status_message {
        Some(message) => format!("{} ({})", status, message),
        None => status.to_string(),
    }
}

fn print_entry(label: &str, entry: &QueueEntry) {
    println!(
        "  [{}] {} at {} -> {}",
        label,
        entry.file,
        entry.scheduled_time,
        entry.platforms.join(", ")
    );
}
