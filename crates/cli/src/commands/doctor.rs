//! Doctor command - validate configuration and show status

use anyhow::Result;
use crosspost_adapters::{posts::FsPostRepository, state::JsonFileStore};
use crosspost_domain::PostRepository;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    schedule: CheckResult,
    posts: CheckResult,
    state: CheckResult,
    medium: CheckResult,
    devto: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        schedule: CheckResult::error("Not checked"),
        posts: CheckResult::error("Not checked"),
        state: CheckResult::error("Not checked"),
        medium: CheckResult::error("Not checked"),
        devto: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.schedule = check_schedule(config);
        report.posts = check_posts(&config.general.posts_dir).await;
        report.state = check_state(config).await;
        report.medium = check_credential(
            "Medium",
            config.medium.enabled,
            &config.medium.token_env,
        );
        report.devto = check_credential(
            "Dev.to",
            config.devto.enabled,
            &config.devto.api_key_env,
        );
    }

    let checks = [
        &report.config,
        &report.schedule,
        &report.posts,
        &report.state,
        &report.medium,
        &report.devto,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_schedule(config: &AppConfig) -> CheckResult {
    match config.schedule.to_schedule() {
        Ok(schedule) => CheckResult::ok(format!("{} weekly slot(s)", schedule.slots().len())),
        Err(e) => CheckResult::error(format!("{:#}", e)),
    }
}

async fn check_posts(dir: &Path) -> CheckResult {
    if !dir.is_dir() {
        return CheckResult::error(format!("Posts directory does not exist: {}", dir.display()));
    }

    let repo = FsPostRepository::new(dir);
    let files = match repo.list_posts().await {
        Ok(files) => files,
        Err(e) => return CheckResult::error(format!("Failed to list posts: {}", e)),
    };

    let mut invalid = Vec::new();
    for file in &files {
        if let Err(e) = repo.convert(file).await {
            invalid.push(serde_json::json!({ "file": file, "error": e.message }));
        }
    }

    let details = serde_json::json!({ "count": files.len(), "invalid": invalid });
    if files.is_empty() {
        CheckResult::warn(format!("No markdown posts in {}", dir.display())).with_details(details)
    } else if invalid.is_empty() {
        CheckResult::ok(format!("{} post(s) found", files.len())).with_details(details)
    } else {
        CheckResult::warn(format!(
            "{} post(s) found, {} with invalid frontmatter",
            files.len(),
            invalid.len()
        ))
        .with_details(details)
    }
}

async fn check_state(config: &AppConfig) -> CheckResult {
    let root = &config.general.project_root;
    if !root.is_dir() {
        return CheckResult::error(format!("Project root does not exist: {}", root.display()));
    }

    let mut notes = Vec::new();
    for path in [
        config.tracking_path(),
        config.queue_path(),
        config.cooldowns_path(),
    ] {
        let store = JsonFileStore::new(&path);
        match store.read().await {
            (Some(document), true) => {
                notes.push(format!("{}: {} entries", path.display(), document.len()));
            }
            (Some(_), false) => {
                return CheckResult::warn(format!(
                    "{} is unreadable; the next write restores it from {}",
                    path.display(),
                    store.backup_path().display()
                ));
            }
            (None, _) if path.exists() || store.backup_path().exists() => {
                return CheckResult::warn(format!(
                    "{} is unreadable; it will start empty",
                    path.display()
                ));
            }
            (None, _) => notes.push(format!("{}: not created yet", path.display())),
        }
    }

    CheckResult::ok(format!("State under {}", root.display()))
        .with_details(serde_json::json!({ "files": notes }))
}

fn check_credential(platform: &str, enabled: bool, env_var: &str) -> CheckResult {
    if !enabled {
        return CheckResult::ok(format!("{} disabled", platform));
    }

    if env_var.is_empty() {
        return CheckResult::error(format!("No credential env var configured for {}", platform));
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!("Credential: {} (set)", env_var)),
        _ => CheckResult::warn(format!(
            "Credential: {} (not set), {} will be skipped",
            env_var, platform
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("crosspost Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Schedule", &report.schedule);
    print_check("Posts", &report.posts);
    print_check("State", &report.state);
    print_check("Medium", &report.medium);
    print_check("Dev.to", &report.devto);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: crosspost run --dry-run");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
