//! Run command - publish unpublished posts, once or on an interval

use anyhow::{Context, Result};
use crosspost_domain::{
    AttemptOutcome, CycleReport,
    usecases::{CycleError, PublishCycle},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::interval;

use crate::args::RunArgs;
use crate::commands::{CycleOptions, build_cycle};
use crate::config::AppConfig;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let dry_run = args.dry_run || config.general.dry_run;
    let mode = args.mode.map(Into::into).unwrap_or(config.general.mode);
    let posts_dir = args
        .posts_dir
        .clone()
        .unwrap_or_else(|| config.general.posts_dir.clone());

    tracing::info!(
        dry_run = dry_run,
        watch = args.watch,
        mode = ?mode,
        posts_dir = %posts_dir.display(),
        "Starting crosspost run"
    );

    let mut cycle = build_cycle(
        &config,
        CycleOptions {
            posts_dir: &posts_dir,
            mode,
            dry_run,
        },
    )
    .await
    .context("Failed to set up publishing")?;

    if !args.watch {
        let report = cycle.run_once().await.context("Publishing cycle failed")?;
        log_report(&report);
        tracing::info!("crosspost run completed");
        return Ok(());
    }

    let poll_interval = Duration::from_secs(config.general.poll_interval_secs.max(1));
    watch(&mut cycle, poll_interval)
        .await
        .context("Publishing cycle failed")?;

    tracing::info!("crosspost run completed");
    Ok(())
}

/// Repeat cycles until Ctrl-C. A post listing failure is retried next tick;
/// a state write failure ends the run.
async fn watch(cycle: &mut PublishCycle, poll_interval: Duration) -> Result<(), CycleError> {
    let mut ticker = interval(poll_interval);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cycle.run_once().await {
                    Ok(report) => log_report(&report),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => tracing::error!(error = %e, "Publishing cycle failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down gracefully");
                return Ok(());
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    for scheduled in &report.scheduled {
        tracing::info!(
            file = %scheduled.file,
            platforms = ?scheduled.platforms,
            scheduled_time = %scheduled.scheduled_time,
            "Scheduled"
        );
    }

    for attempt in &report.attempts {
        match &attempt.outcome {
            AttemptOutcome::Published { url } => {
                tracing::info!(file = %attempt.file, platform = %attempt.platform, url = %url, "Published");
            }
            AttemptOutcome::Duplicate { message } => {
                tracing::warn!(file = %attempt.file, platform = %attempt.platform, message = %message, "Duplicate");
            }
            AttemptOutcome::RateLimited { until } => {
                tracing::warn!(file = %attempt.file, platform = %attempt.platform, until = %until, "Rate limited");
            }
            AttemptOutcome::Failed { error, retryable } => {
                tracing::error!(
                    file = %attempt.file,
                    platform = %attempt.platform,
                    error = %error,
                    retryable = retryable,
                    "Failed"
                );
            }
            AttemptOutcome::ConversionFailed { error } => {
                tracing::error!(file = %attempt.file, platform = %attempt.platform, error = %error, "Conversion failed");
            }
            AttemptOutcome::DryRun => {
                tracing::debug!(file = %attempt.file, platform = %attempt.platform, "Dry run");
            }
        }
    }

    tracing::info!(
        published = report.published_count(),
        failed = report.failure_count(),
        scheduled = report.scheduled.len(),
        cleaned = report.cleaned,
        "Cycle summary"
    );
}
