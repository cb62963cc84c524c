use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Target ────────────────────────────────────────────────────────────────────

/// Which listing row we care about, and the most we'd pay for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetSpec {
    pub capacity: String,
    pub model: String,
    pub max_price: f64,
}

impl TargetSpec {
    pub fn matches(&self, capacity: &str, model: &str) -> bool {
        capacity == self.capacity && model == self.model
    }

    /// "14TB WD Elements costs $219.99"
    pub fn price_message(&self, price: f64) -> String {
        format!("{} {} costs ${:.2}", self.capacity, self.model, price)
    }
}

// ── Listing row ───────────────────────────────────────────────────────────────

/// A row of the listing table, as located on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRow {
    /// 1-based position in the table
    pub index: usize,
    pub capacity_text: String,
    pub model_text: String,
    pub price_text: String,
    /// Only looked up when a notification is about to go out
    pub detail_link: Option<String>,
}

// ── Persisted record ──────────────────────────────────────────────────────────

/// The last price we sent an SMS about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceRecord {
    Never,
    Notified(f64),
}

impl PriceRecord {
    pub const NEVER_TOKEN: &'static str = "never";

    /// Strict less-than: an equal price is already covered.
    pub fn should_notify(&self, current: f64) -> bool {
        match self {
            PriceRecord::Never => true,
            PriceRecord::Notified(prev) => current < *prev,
        }
    }
}

impl fmt::Display for PriceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceRecord::Never => f.write_str(Self::NEVER_TOKEN),
            PriceRecord::Notified(p) => write!(f, "{:.2}", p),
        }
    }
}

// ── Extraction outcome ────────────────────────────────────────────────────────

/// Result of reading one value off the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    ParseFailed(String),
}

impl<T> Lookup<T> {
    /// `what` names the missing/garbled value in the error message.
    pub fn into_result(self, what: &str) -> Result<T> {
        match self {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => Err(MonitorError::NotFound(what.to_string())),
            Lookup::ParseFailed(raw) => Err(MonitorError::Parse(format!(
                "could not extract {} from {:?}",
                what, raw
            ))),
        }
    }
}

// ── Check result ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Price is at or above the ceiling; nothing else happens.
    OverCeiling,
    /// Under the ceiling but not lower than what we already reported.
    AlreadyNotified,
    /// SMS sent and the record updated.
    Notified,
    /// Would have notified, but this was a dry run.
    DryRun,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub current_price: f64,
    pub previous: PriceRecord,
    pub under_ceiling: bool,
    pub improves: bool,
    pub outcome: Outcome,
}
