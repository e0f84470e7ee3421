//! Clean command - drop completed queue entries past retention

use anyhow::{Context, Result};
use crosspost_domain::{Clock, SystemClock, usecases::PostQueue};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::CleanArgs;
use crate::commands::Stores;
use crate::config::AppConfig;

pub async fn execute(args: CleanArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let days = args.days.unwrap_or(config.general.clean_after_days);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let stores = if config.general.dry_run {
        Stores::snapshot(&config).await
    } else {
        Stores::open(&config)
    };
    let mut queue = PostQueue::open(stores.queue, config.schedule.to_schedule()?, clock).await;

    let removed = queue
        .clean(days)
        .await
        .context("Failed to clean queue")?;

    tracing::info!(removed = removed, days = days, "Queue cleaned");
    println!("Removed {} completed item(s) older than {} day(s)", removed, days);

    Ok(())
}
