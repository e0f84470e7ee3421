//! Convert command - export each post's metadata and body as JSON

use anyhow::{Context, Result};
use crosspost_adapters::posts::FsPostRepository;
use crosspost_domain::PostRepository;
use std::path::PathBuf;

use crate::args::ConvertArgs;
use crate::config::AppConfig;

pub async fn execute(args: ConvertArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let posts_dir = args.posts_dir.unwrap_or(config.general.posts_dir);
    let output_dir = args.output_dir.unwrap_or(config.general.output_dir);

    let repo = FsPostRepository::new(&posts_dir);
    let files = repo
        .list_posts()
        .await
        .with_context(|| format!("Failed to list posts in {}", posts_dir.display()))?;

    let mut converted = 0usize;
    let mut failed = 0usize;
    for file in &files {
        match repo.export_json(file, &output_dir).await {
            Ok(_) => converted += 1,
            Err(e) => {
                tracing::error!(file = %file, error = %e, "Conversion failed");
                failed += 1;
            }
        }
    }

    println!(
        "Converted {} post(s) into {} ({} failed)",
        converted,
        output_dir.display(),
        failed
    );

    Ok(())
}
