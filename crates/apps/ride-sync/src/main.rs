//! ride-sync - import Strava ride history into CycleGraph
//!
//! Walks the import proxy page by page, printing progress as it goes.
//! Ctrl-C stops the import; rides imported so far are kept.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::Arc;

use rides::{ImportService, ImportSettings, ImportSummary, ProgressSnapshot, SyncStatus};

mod cli;

use cli::{Cli, Command, ImportArgs};

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Last) => show_last(),
        None => run_import(&cli.import),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: &ImportArgs) -> Result<ImportSettings> {
    let mut settings = match &args.settings {
        Some(path) => ImportSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ImportSettings::load()?,
    };

    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(cookie) = &args.cookie {
        settings = settings.with_session_cookie(cookie.trim());
    }

    if settings.session_cookie.is_none() {
        warn!(
            "No session cookie configured; the server will reject the import.\n\
             Pass --cookie, set CG_UID, or add \"session_cookie\" to {}",
            ImportSettings::default_settings_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "ride-import.json".to_string())
        );
    }
    Ok(settings)
}

fn run_import(args: &ImportArgs) -> Result<ExitCode> {
    let settings = load_settings(args)?;
    let service = Arc::new(ImportService::from_settings(&settings)?);

    service.subscribe(Arc::new(print_progress));

    let handle = Arc::clone(&service);
    ctrlc::set_handler(move || {
        if handle.cancel() {
            eprintln!("Stopping import...");
        }
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Importing rides from {}", settings.base_url);
    service.start(args.request())?;

    let Some(last) = service.wait() else {
        anyhow::bail!("Import stopped unexpectedly");
    };

    println!("{}", last.message);
    if last.error_count > 0 {
        println!("{} rides could not be imported", last.error_count);
    }
    if let (SyncStatus::Cancelled | SyncStatus::Error, Some(next)) = (last.status, last.next_page) {
        println!("Resume with --page {}", next);
    }

    Ok(match last.status {
        SyncStatus::Done => ExitCode::SUCCESS,
        SyncStatus::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

fn print_progress(snapshot: &ProgressSnapshot) {
    // The final snapshot is reported once the run returns
    if snapshot.status != SyncStatus::Idle && !snapshot.status.is_terminal() {
        println!(
            "[page {:>3}] {} rides imported (+{}) - {}",
            snapshot.current_page,
            snapshot.imported_total,
            snapshot.last_batch_count,
            snapshot.message
        );
    }
}

fn show_last() -> Result<ExitCode> {
    let Some(summary) = ImportSummary::load_latest()? else {
        println!("No import has been run yet");
        return Ok(ExitCode::SUCCESS);
    };

    let finished = summary.finished_at.with_timezone(&chrono::Local);
    println!(
        "Last import: {} at {}",
        summary.status,
        finished.format("%Y-%m-%d %H:%M")
    );
    println!("  {}", summary.message);
    println!(
        "  {} rides imported, {} errors, {} pages",
        summary.imported_total, summary.error_count, summary.pages
    );
    if !summary.is_recent() {
        println!("  (more than a day old)");
    }
    Ok(ExitCode::SUCCESS)
}
