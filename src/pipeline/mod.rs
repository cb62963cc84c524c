//! One price check, start to finish.
//!
//! 1. Open the listing and read the target row's price
//! 2. Load the last notified price
//! 3. Under the ceiling and lower than before (or never notified): re-open the
//!    listing for the product link, send the SMS, then persist the new price
//! 4. Log when cron will run us next
//!
//! The page session is closed on every path out of [`PriceMonitor::run`].

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{CheckResult, Outcome, PriceRecord, TargetSpec};
use crate::notify::{compose_message, Messenger};
use crate::schedule::Schedule;
use crate::scraper::{fetch_current_price, fetch_detail_link, ListingPage};
use crate::storage::PriceStore;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

pub struct PriceMonitor<M: Messenger> {
    config: AppConfig,
    target: TargetSpec,
    schedule: Schedule,
    store: PriceStore,
    messenger: M,
    started_at: DateTime<Local>,
    dry_run: bool,
}

impl<M: Messenger> PriceMonitor<M> {
    pub fn new(config: AppConfig, messenger: M, started_at: DateTime<Local>) -> Result<Self> {
        let schedule = Schedule::parse(&config.schedule.cron)?;
        Ok(Self {
            target: config.target_spec(),
            store: PriceStore::new(config.storage.price_file.clone()),
            schedule,
            config,
            messenger,
            started_at,
            dry_run: false,
        })
    }

    /// Decide and log as usual, but neither send nor persist.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the check and always release `page` afterwards.
    pub async fn run<P: ListingPage + ?Sized>(&self, page: &mut P) -> Result<CheckResult> {
        let result = self.check(page).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page session: {}", e);
        }

        let result = result?;
        self.report_next_run();
        Ok(result)
    }

    async fn check<P: ListingPage + ?Sized>(&self, page: &mut P) -> Result<CheckResult> {
        let url = &self.config.browser.listing_url;
        let layout = &self.config.listing;

        let (mut row, price) = fetch_current_price(page, url, &self.target, layout).await?;
        let previous = self.store.load();
        debug!("Last notified: {} ({:?})", previous, self.store.path());
        let under_ceiling = price < self.target.max_price;
        let improves = previous.should_notify(price);

        let outcome = if !under_ceiling {
            info!("Terrible news...");
            info!("{}", self.target.price_message(price));
            Outcome::OverCeiling
        } else {
            info!("Good news everyone!");
            info!("{}", self.target.price_message(price));

            if improves {
                let link = fetch_detail_link(page, url, &mut row, layout).await?;
                let body = compose_message(&self.target, price, &link);

                if self.dry_run {
                    info!("Dry run, not sending:\n{}", body);
                    Outcome::DryRun
                } else {
                    let twilio = &self.config.twilio;
                    self.messenger.send(&twilio.from_num, &twilio.to_num, &body).await?;
                    self.store.save(price)?;
                    debug!("Notified via {}", row.detail_link.as_deref().unwrap_or(""));
                    Outcome::Notified
                }
            } else {
                if let PriceRecord::Notified(prev) = previous {
                    info!("Already notified at ${:.2}", prev);
                }
                Outcome::AlreadyNotified
            }
        };

        Ok(CheckResult {
            current_price: price,
            previous,
            under_ceiling,
            improves,
            outcome,
        })
    }

    fn report_next_run(&self) {
        match self.schedule.next_after(&self.started_at) {
            Some(next) => info!("Next run time: {}", next.format("%Y-%m-%d %H:%M:%S %Z")),
            None => warn!("Schedule {:?} has no upcoming run", self.schedule.expression()),
        }
    }
}
