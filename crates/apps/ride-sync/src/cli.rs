//! Command line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use rides::SyncRequest;
use rides::sync::{MAX_BATCH_LIMIT, MAX_PAGE_SIZE, MAX_WINDOW_DAYS};

#[derive(Debug, Parser)]
#[command(name = "ride-sync", version, about = "Import Strava ride history into CycleGraph")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub import: ImportArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the result of the most recent import
    Last,
}

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// How far back to import, in days
    #[arg(long, default_value_t = 365, value_parser = clap::value_parser!(u32).range(1..=MAX_WINDOW_DAYS as i64))]
    pub days: u32,

    /// Activities requested per page
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
    pub per_page: u32,

    /// Streams fetched per page
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=MAX_BATCH_LIMIT as i64))]
    pub batch_limit: u32,

    /// Run ride analysis on imported rides
    #[arg(long)]
    pub analyze: bool,

    /// Page to start from (resumes an interrupted import)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Import API base URL, e.g. http://localhost:5175/api/strava
    #[arg(long)]
    pub base_url: Option<String>,

    /// Session cookie value (the signed-in CycleGraph user id)
    #[arg(long, env = "CG_UID", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Settings file to use instead of the config directory
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl ImportArgs {
    pub fn request(&self) -> SyncRequest {
        SyncRequest {
            page: self.page,
            window_days: self.days,
            page_size: self.per_page,
            batch_limit: self.batch_limit,
            analyze: self.analyze,
        }
    }
}
