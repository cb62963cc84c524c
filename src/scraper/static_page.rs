//! Browserless backend: one GET per `open`, cells pulled out of the HTML.
//!
//! Only suitable when the listing is server-rendered. Cell addressing mirrors
//! `//tr[row]/td[column]`: the first `tr` in document order that is the
//! `row`-th `tr` among its siblings and has a `column`-th `td`.

use crate::config::BrowserConfig;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{CellLocator, ListingPage};

#[derive(Debug, Clone, Default, PartialEq)]
struct Cell {
    text: String,
    /// `href` of an `<a>` that is a direct child of the cell
    href: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    /// Position among sibling `tr` elements, 1-based
    position: usize,
    cells: Vec<Cell>,
}

pub struct StaticPage {
    client: reqwest::Client,
    rows: Vec<Row>,
}

impl StaticPage {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(|e| MonitorError::Browser(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, rows: Vec::new() })
    }

    fn find(&self, locator: &CellLocator) -> Option<&Cell> {
        let col = locator.column.checked_sub(1)?;
        self.rows
            .iter()
            .filter(|r| r.position == locator.row)
            .find_map(|r| r.cells.get(col))
    }
}

/// Flatten every table row of `html`. `base` resolves relative links.
fn parse_rows(html: &str, base: Option<&Url>) -> Result<Vec<Row>> {
    let doc = Html::parse_document(html);
    let tr_sel = Selector::parse("tr").map_err(|e| MonitorError::Parse(format!("tr selector: {:?}", e)))?;

    let mut rows = Vec::new();
    for tr in doc.select(&tr_sel) {
        let position = 1 + tr
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
            .count();

        let cells = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "td")
            .map(|td| Cell {
                text: collapse_whitespace(&td.text().collect::<String>()),
                href: td
                    .children()
                    .filter_map(ElementRef::wrap)
                    .find(|e| e.value().name() == "a")
                    .and_then(|a| a.value().attr("href"))
                    .map(|h| resolve(base, h)),
            })
            .collect();

        rows.push(Row { position, cells });
    }
    Ok(rows)
}

/// Rendered-text approximation: runs of whitespace (incl. newlines) become one space.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

#[async_trait]
impl ListingPage for StaticPage {
    async fn open(&mut self, url: &str) -> Result<()> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MonitorError::Browser(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MonitorError::Browser(format!("HTTP {} from {}", status, url)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MonitorError::Browser(format!("failed to read body of {}: {}", url, e)))?;

        let base = Url::parse(url).ok();
        self.rows = parse_rows(&body, base.as_ref())?;
        debug!("{}: {} table rows", url, self.rows.len());
        Ok(())
    }

    async fn text(&mut self, locator: &CellLocator) -> Result<Option<String>> {
        if locator.anchor {
            return Ok(None);
        }
        Ok(self.find(locator).map(|c| c.text.clone()))
    }

    async fn attr(&mut self, locator: &CellLocator, name: &str) -> Result<Option<String>> {
        // Only cell anchors' href is tracked.
        if !locator.anchor || name != "href" {
            return Ok(None);
        }
        Ok(self.find(locator).and_then(|c| c.href.clone()))
    }

    async fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}
