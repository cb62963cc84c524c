use crate::config::BrowserConfig;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info};

use super::{CellLocator, ListingPage};

/// A remote Selenium / WebDriver session.
pub struct WebDriverPage {
    client: Option<Client>,
}

impl WebDriverPage {
    /// Start a new (headless by default) Chrome session on the remote endpoint.
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let url = config.webdriver_url.as_deref().ok_or_else(|| {
            MonitorError::Config("browser.webdriver_url is required for the webdriver backend".into())
        })?;

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".into(), json!("chrome"));
        if config.headless {
            caps.insert("goog:chromeOptions".into(), json!({ "args": ["--headless"] }));
        }

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder
            .connect(url)
            .await
            .map_err(|e| MonitorError::Browser(format!("could not start session on {}: {}", url, e)))?;

        info!("WebDriver session started on {}", url);
        Ok(Self { client: Some(client) })
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| MonitorError::Browser("session already closed".into()))
    }
}

fn browser_err(e: CmdError) -> MonitorError {
    MonitorError::Browser(e.to_string())
}

#[async_trait]
impl ListingPage for WebDriverPage {
    async fn open(&mut self, url: &str) -> Result<()> {
        debug!("GET {}", url);
        self.client()?.goto(url).await.map_err(browser_err)
    }

    async fn text(&mut self, locator: &CellLocator) -> Result<Option<String>> {
        let xpath = locator.xpath();
        match self.client()?.find(Locator::XPath(&xpath)).await {
            Ok(el) => Ok(Some(el.text().await.map_err(browser_err)?)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(browser_err(e)),
        }
    }

    async fn attr(&mut self, locator: &CellLocator, name: &str) -> Result<Option<String>> {
        let xpath = locator.xpath();
        match self.client()?.find(Locator::XPath(&xpath)).await {
            Ok(el) => el.attr(name).await.map_err(browser_err),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(browser_err(e)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.close().await.map_err(browser_err)?;
            info!("WebDriver session closed");
        }
        Ok(())
    }
}
