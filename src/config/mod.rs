use crate::error::{MonitorError, Result};
use crate::models::TargetSpec;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub target: TargetConfig,
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// The listing row we are watching
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    pub capacity: String,
    pub model: String,
    pub max_price: f64,
}

/// Twilio SMS credentials and phone numbers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwilioConfig {
    pub from_num: String,
    pub to_num: String,
    pub sid: String,
    pub token: String,

    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserBackend {
    /// Remote Selenium / WebDriver session
    #[default]
    Webdriver,
    /// Plain GET + HTML parsing, no JavaScript
    Http,
}

/// Page access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub backend: BrowserBackend,

    #[serde(default)]
    pub webdriver_url: Option<String>,

    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Column layout of the listing table (1-based, like the page's own markup)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    #[serde(default = "default_capacity_column")]
    pub capacity_column: usize,

    #[serde(default = "default_model_column")]
    pub model_column: usize,

    #[serde(default = "default_price_column")]
    pub price_column: usize,

    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_cron")]
    pub cron: String,

    #[serde(default = "default_crontab_path")]
    pub crontab_path: PathBuf,

    #[serde(default = "default_command")]
    pub command: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_price_file")]
    pub price_file: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_twilio_api_base() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}
fn default_listing_url() -> String {
    "https://shucks.top/".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "shuck-watch/0.1 (single-listing price check)".to_string()
}
fn default_capacity_column() -> usize {
    1
}
fn default_model_column() -> usize {
    2
}
fn default_price_column() -> usize {
    4
}
fn default_max_rows() -> usize {
    50
}
fn default_cron() -> String {
    "0 */8 * * *".to_string()
}
fn default_crontab_path() -> PathBuf {
    PathBuf::from("/app/crontab")
}
fn default_command() -> String {
    "/app/shuck-watch check".to_string()
}
fn default_price_file() -> PathBuf {
    PathBuf::from("notified_price.txt")
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            backend: BrowserBackend::default(),
            webdriver_url: None,
            listing_url: default_listing_url(),
            headless: true,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            capacity_column: default_capacity_column(),
            model_column: default_model_column(),
            price_column: default_price_column(),
            max_rows: default_max_rows(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            crontab_path: default_crontab_path(),
            command: default_command(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            price_file: default_price_file(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let app_cfg: AppConfig = Self::sources()?.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    /// Only the `schedule` section; the crontab generator needs nothing else.
    pub fn load_schedule() -> Result<ScheduleConfig> {
        match Self::sources()?.get::<ScheduleConfig>("schedule") {
            Ok(s) => Ok(s),
            Err(config::ConfigError::NotFound(_)) => Ok(ScheduleConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn sources() -> Result<config::Config> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SHUCK").separator("__"))
            .build()?;
        Ok(cfg)
    }

    /// Reject configurations that cannot produce a meaningful run.
    /// Nothing here touches the network, so it always runs before a session exists.
    pub fn validate(&self) -> Result<()> {
        Schedule::parse(&self.schedule.cron)?;

        require("target.capacity", &self.target.capacity)?;
        require("target.model", &self.target.model)?;
        if !self.target.max_price.is_finite() || self.target.max_price <= 0.0 {
            return Err(MonitorError::Config(format!(
                "target.max_price must be a positive number, got {}",
                self.target.max_price
            )));
        }

        require("twilio.from_num", &self.twilio.from_num)?;
        require("twilio.to_num", &self.twilio.to_num)?;
        require("twilio.sid", &self.twilio.sid)?;
        require("twilio.token", &self.twilio.token)?;

        url::Url::parse(&self.browser.listing_url).map_err(|e| {
            MonitorError::Config(format!("browser.listing_url is not a URL: {}", e))
        })?;

        if self.browser.backend == BrowserBackend::Webdriver {
            match self.browser.webdriver_url.as_deref() {
                Some(u) if !u.trim().is_empty() => {
                    url::Url::parse(u).map_err(|e| {
                        MonitorError::Config(format!("browser.webdriver_url is not a URL: {}", e))
                    })?;
                }
                _ => {
                    return Err(MonitorError::Config(
                        "browser.webdriver_url is required for the webdriver backend".into(),
                    ));
                }
            }
        }

        let l = &self.listing;
        if [l.capacity_column, l.model_column, l.price_column, l.max_rows].contains(&0) {
            return Err(MonitorError::Config(
                "listing columns and max_rows are 1-based and must be non-zero".into(),
            ));
        }

        Ok(())
    }

    pub fn target_spec(&self) -> TargetSpec {
        TargetSpec {
            capacity: self.target.capacity.clone(),
            model: self.target.model.clone(),
            max_price: self.target.max_price,
        }
    }
}

fn require(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(MonitorError::Config(format!("{} must not be empty", key)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        target: TargetConfig {
            capacity: "14TB".into(),
            model: "WD Elements".into(),
            max_price: 230.0,
        },
        twilio: TwilioConfig {
            from_num: "+15550001111".into(),
            to_num: "+15550002222".into(),
            sid: "AC123".into(),
            token: "secret".into(),
            api_base: default_twilio_api_base(),
        },
        browser: BrowserConfig {
            webdriver_url: Some("http://localhost:4444".into()),
            ..Default::default()
        },
        listing: ListingConfig::default(),
        schedule: ScheduleConfig::default(),
        storage: StorageConfig::default(),
    }
}
