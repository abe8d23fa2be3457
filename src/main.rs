mod article;
mod closure;
mod config;
mod db;
mod error;
mod export;
mod fetch;
#[cfg(test)]
mod fixtures;
mod rows;
mod scheduler;
mod thread;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::fetch::HttpFetcher;
use crate::rows::Layout;
use crate::scheduler::Crawler;

#[derive(Parser)]
#[command(name = "stackernews", about = "Tracking and categorizing Hacker News")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodically snapshot the articles on the front page of HN, and their comments
    PollHn {
        /// How frequently to snapshot the front page
        #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
        interval: Duration,
        /// The comments request frequency cap
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        throttle: Duration,
    },
    /// Write the latest snapshot and its comment threads as JSON
    Export {
        #[arg(short, long, default_value = "snapshot.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load(path)?,
        None => Config::default(),
    };

    // Open SQLite database
    let conn = db::connect(&config.database)?;

    // Initialize tables
    db::init(&conn)?;

    match cli.command {
        Commands::PollHn { interval, throttle } => {
            let root = Url::parse(&config.root_url)?;
            let fetcher = HttpFetcher::new(&config)?;
            let crawler = Crawler::new(fetcher, conn, Layout::new()?, root);

            info!(database = %config.database.display(), "stackernews started");
            scheduler::run(crawler, interval, throttle).await
        }
        Commands::Export { output } => {
            if export::export_json(&conn, &output)? {
                info!(path = %output.display(), "exported latest snapshot");
            } else {
                info!("no snapshot to export yet");
            }
            Ok(())
        }
    }
}
