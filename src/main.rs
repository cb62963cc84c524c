mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod schedule;
mod scraper;
mod storage;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, BrowserBackend};
use crate::notify::TwilioMessenger;
use crate::pipeline::PriceMonitor;
use crate::schedule::Schedule;
use crate::scraper::{ListingPage, StaticPage, WebDriverPage};

#[derive(Parser)]
#[command(name = "shuck-watch", about = "Drive price watcher with SMS alerts", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Check the listing once and text if the price dropped (default)
    Check {
        /// Log the message instead of sending it; leaves the price file alone
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the crontab line that re-invokes `check` on schedule
    Crontab {
        /// Output path (default: schedule.crontab_path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let started_at = Local::now();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "shuck_watch=info,warn",
        1 => "shuck_watch=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    match cli.command.unwrap_or(Command::Check { dry_run: false }) {
        Command::Check { dry_run } => {
            // Validation (including the cron expression) happens before any session exists.
            let config = AppConfig::load().context("Invalid configuration")?;
            let messenger = TwilioMessenger::new(&config.twilio);
            let backend = config.browser.backend;
            let browser = config.browser.clone();
            let monitor = PriceMonitor::new(config, messenger, started_at)?.dry_run(dry_run);

            let mut page: Box<dyn ListingPage> = match backend {
                BrowserBackend::Webdriver => Box::new(WebDriverPage::connect(&browser).await?),
                BrowserBackend::Http => Box::new(StaticPage::new(&browser)?),
            };

            let result = monitor.run(&mut *page).await.context("Price check failed")?;
            info!(
                "Done: ${:.2} {:?} (under ceiling: {}, improves: {}, last notified: {})",
                result.current_price,
                result.outcome,
                result.under_ceiling,
                result.improves,
                result.previous
            );
        }

        Command::Crontab { path } => {
            let schedule_cfg = AppConfig::load_schedule().context("Invalid configuration")?;
            let schedule = Schedule::parse(&schedule_cfg.cron)?;
            let path = path.unwrap_or(schedule_cfg.crontab_path);
            schedule.write_crontab(&path, &schedule_cfg.command)?;
        }
    }

    Ok(())
}
