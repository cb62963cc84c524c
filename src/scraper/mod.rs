pub mod static_page;
pub mod webdriver;

use crate::config::ListingConfig;
use crate::error::Result;
use crate::models::{ListingRow, Lookup, TargetSpec};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

pub use self::static_page::StaticPage;
pub use self::webdriver::WebDriverPage;

/// Optional `$`, 1–3 integer digits, exactly two decimals.
/// The amount may not be glued to a longer number on either side.
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d,.])\$?(\d{1,3}\.\d{2})\b").expect("price regex"));

// ── Locator ───────────────────────────────────────────────────────────────────

/// A cell of the listing table, addressed the way `//tr[row]/td[column]` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLocator {
    pub row: usize,
    pub column: usize,
    /// Address the `<a>` directly inside the cell instead of the cell itself
    pub anchor: bool,
}

impl CellLocator {
    pub fn cell(row: usize, column: usize) -> Self {
        Self { row, column, anchor: false }
    }

    pub fn anchor(row: usize, column: usize) -> Self {
        Self { row, column, anchor: true }
    }

    pub fn xpath(&self) -> String {
        let base = format!("//tr[{}]/td[{}]", self.row, self.column);
        if self.anchor { format!("{}/a", base) } else { base }
    }
}

// ── Page trait ────────────────────────────────────────────────────────────────

/// What the monitor needs from a browser session.
/// `Ok(None)` means "no such element"; `Err` is reserved for session/transport failures.
#[async_trait]
pub trait ListingPage: Send {
    async fn open(&mut self, url: &str) -> Result<()>;
    async fn text(&mut self, locator: &CellLocator) -> Result<Option<String>>;
    async fn attr(&mut self, locator: &CellLocator, name: &str) -> Result<Option<String>>;
    /// Release the session. Must be safe to call after any failure.
    async fn close(&mut self) -> Result<()>;
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Pull the first `$ddd.dd` amount out of a cell's text.
pub fn parse_price(text: &str) -> Lookup<f64> {
    PRICE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(Lookup::Found)
        .unwrap_or_else(|| Lookup::ParseFailed(text.to_string()))
}

/// Scan rows `1..max_rows` for the first exact (capacity, model) match.
/// The page must already be open.
pub async fn locate_target_row<P: ListingPage + ?Sized>(
    page: &mut P,
    target: &TargetSpec,
    layout: &ListingConfig,
) -> Result<ListingRow> {
    let not_found = || {
        format!(
            "{} {} in the first {} rows",
            target.capacity,
            target.model,
            layout.max_rows.saturating_sub(1)
        )
    };

    for row in 1..layout.max_rows {
        let capacity = page.text(&CellLocator::cell(row, layout.capacity_column)).await?;
        let model = page.text(&CellLocator::cell(row, layout.model_column)).await?;

        let (Some(capacity), Some(model)) = (capacity, model) else {
            debug!("Row {} has no capacity/model cell, table ended", row);
            return Lookup::NotFound.into_result(&not_found());
        };

        if target.matches(&capacity, &model) {
            debug!("Matched {} {} at row {}", capacity, model, row);
            return Ok(ListingRow {
                index: row,
                capacity_text: capacity,
                model_text: model,
                ..Default::default()
            });
        }
    }

    Lookup::NotFound.into_result(&not_found())
}

/// Read and parse the price cell of an already located row.
pub async fn extract_price<P: ListingPage + ?Sized>(
    page: &mut P,
    row: &mut ListingRow,
    layout: &ListingConfig,
) -> Result<f64> {
    let lookup = match page.text(&CellLocator::cell(row.index, layout.price_column)).await? {
        None => Lookup::NotFound,
        Some(text) => {
            row.price_text = text;
            parse_price(&row.price_text)
        }
    };
    lookup.into_result(&format!("price for {} {}", row.capacity_text, row.model_text))
}

/// Open the listing, find the target row and read its price.
pub async fn fetch_current_price<P: ListingPage + ?Sized>(
    page: &mut P,
    url: &str,
    target: &TargetSpec,
    layout: &ListingConfig,
) -> Result<(ListingRow, f64)> {
    info!("Fetching listing {}", url);
    page.open(url).await?;

    let mut row = locate_target_row(page, target, layout).await?;
    let price = extract_price(page, &mut row, layout).await?;
    info!("{} {}: {} -> ${:.2}", row.capacity_text, row.model_text, row.price_text.trim(), price);
    Ok((row, price))
}

/// Reload the listing and read the product link out of the row's price cell.
pub async fn fetch_detail_link<P: ListingPage + ?Sized>(
    page: &mut P,
    url: &str,
    row: &mut ListingRow,
    layout: &ListingConfig,
) -> Result<String> {
    page.open(url).await?;

    let href = page
        .attr(&CellLocator::anchor(row.index, layout.price_column), "href")
        .await?
        .filter(|h| !h.trim().is_empty());

    let link = match href {
        Some(h) => Lookup::Found(h),
        None => Lookup::NotFound,
    }
    .into_result(&format!("product link for {} {}", row.capacity_text, row.model_text))?;

    row.detail_link = Some(link.clone());
    Ok(link)
}

// ── Test double ───────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::MonitorError;

    /// In-memory listing: each row is (capacity, model, price cell text, link).
    #[derive(Default)]
    pub struct FakePage {
        pub rows: Vec<(String, String, Option<String>, Option<String>)>,
        pub opened: usize,
        pub closed: bool,
        pub fail_open: bool,
    }

    impl FakePage {
        pub fn with_rows(rows: &[(&str, &str, Option<&str>, Option<&str>)]) -> Self {
            Self {
                rows: rows
                    .iter()
                    .map(|(c, m, p, l)| {
                        (c.to_string(), m.to_string(), p.map(String::from), l.map(String::from))
                    })
                    .collect(),
                ..Default::default()
            }
        }

        fn cell(&self, loc: &CellLocator) -> Option<String> {
            let (capacity, model, price, _) = self.rows.get(loc.row.checked_sub(1)?)?;
            match loc.column {
                1 => Some(capacity.clone()),
                2 => Some(model.clone()),
                3 => Some(String::new()),
                4 => price.clone(),
                _ => None,
            }
        }
    }

    #[async_trait]
    impl ListingPage for FakePage {
        async fn open(&mut self, _url: &str) -> Result<()> {
            if self.fail_open {
                return Err(MonitorError::Browser("connection refused".into()));
            }
            self.opened += 1;
            Ok(())
        }

        async fn text(&mut self, loc: &CellLocator) -> Result<Option<String>> {
            Ok(self.cell(loc))
        }

        async fn attr(&mut self, loc: &CellLocator, name: &str) -> Result<Option<String>> {
            if !loc.anchor || name != "href" || loc.column != 4 {
                return Ok(None);
            }
            Ok(self
                .rows
                .get(loc.row.wrapping_sub(1))
                .and_then(|(_, _, _, link)| link.clone()))
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakePage;
    use super::*;
    use crate::error::MonitorError;

    fn target() -> TargetSpec {
        TargetSpec {
            capacity: "14TB".into(),
            model: "WD Elements".into(),
            max_price: 230.0,
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$219.99"), Lookup::Found(219.99));
        assert_eq!(parse_price("219.99"), Lookup::Found(219.99));
        assert_eq!(parse_price(" $9.50 at BestBuy"), Lookup::Found(9.5));
    }

    #[test]
    fn test_parse_price_requires_two_decimals() {
        for bad in ["$219.9", "$219", "", "N/A", "$1219.99", "$1,219.99", "$219.999"] {
            assert!(matches!(parse_price(bad), Lookup::ParseFailed(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_xpath() {
        assert_eq!(CellLocator::cell(3, 4).xpath(), "//tr[3]/td[4]");
        assert_eq!(CellLocator::anchor(3, 4).xpath(), "//tr[3]/td[4]/a");
    }

    #[tokio::test]
    async fn test_fetch_current_price() {
        let mut page = FakePage::with_rows(&[
            ("12TB", "WD Elements", Some("$189.99"), None),
            ("14TB", "WD Easystore", Some("$209.99"), None),
            ("14TB", "WD Elements", Some("$219.99"), Some("https://bestbuy.example/14tb")),
        ]);
        let layout = ListingConfig::default();

        let (row, price) = fetch_current_price(&mut page, "https://shucks.top/", &target(), &layout)
            .await
            .unwrap();

        assert_eq!(row.index, 3);
        assert_eq!(row.price_text, "$219.99");
        assert_eq!(price, 219.99);
        assert_eq!(page.opened, 1);
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let mut page = FakePage::with_rows(&[("12TB", "WD Elements", Some("$189.99"), None)]);
        let err = locate_target_row(&mut page, &target(), &ListingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_row_bound_is_respected() {
        let mut rows: Vec<(&str, &str, Option<&str>, Option<&str>)> =
            vec![("8TB", "Other", Some("$99.99"), None); 10];
        rows.push(("14TB", "WD Elements", Some("$219.99"), None));
        let mut page = FakePage::with_rows(&rows);

        let layout = ListingConfig { max_rows: 11, ..Default::default() };
        let err = locate_target_row(&mut page, &target(), &layout).await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));

        let layout = ListingConfig { max_rows: 12, ..Default::default() };
        let row = locate_target_row(&mut page, &target(), &layout).await.unwrap();
        assert_eq!(row.index, 11);
    }

    #[tokio::test]
    async fn test_missing_price_cell_is_not_found() {
        let mut page = FakePage::with_rows(&[("14TB", "WD Elements", None, None)]);
        let err = fetch_current_price(&mut page, "u", &target(), &ListingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_price_is_parse_error() {
        let mut page = FakePage::with_rows(&[("14TB", "WD Elements", Some("$219.9"), None)]);
        let err = fetch_current_price(&mut page, "u", &target(), &ListingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_detail_link() {
        let layout = ListingConfig::default();
        let mut page = FakePage::with_rows(&[
            ("14TB", "WD Elements", Some("$219.99"), Some("https://bestbuy.example/14tb")),
        ]);
        let (mut row, _) = fetch_current_price(&mut page, "u", &target(), &layout).await.unwrap();

        let link = fetch_detail_link(&mut page, "u", &mut row, &layout).await.unwrap();
        assert_eq!(link, "https://bestbuy.example/14tb");
        assert_eq!(row.detail_link.as_deref(), Some("https://bestbuy.example/14tb"));
        assert_eq!(page.opened, 2);
    }

    #[tokio::test]
    async fn test_missing_detail_link() {
        let layout = ListingConfig::default();
        let mut page = FakePage::with_rows(&[("14TB", "WD Elements", Some("$219.99"), None)]);
        let mut row = ListingRow { index: 1, ..Default::default() };
        let err = fetch_detail_link(&mut page, "u", &mut row, &layout).await.unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }
}
