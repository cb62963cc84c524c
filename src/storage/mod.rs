use crate::error::Result;
use crate::models::PriceRecord;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ── Price file ────────────────────────────────────────────────────────────────

/// Flat file holding either `never` or the last notified price, e.g. `219.99`.
/// Read once per run, written at most once.
pub struct PriceStore {
    path: PathBuf,
}

impl PriceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file, `never`, or anything unparsable all mean "never notified".
    pub fn load(&self) -> PriceRecord {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not read {:?} ({}), treating as never notified", self.path, e);
                } else {
                    debug!("{:?} does not exist yet", self.path);
                }
                return PriceRecord::Never;
            }
        };

        parse_record(&raw).unwrap_or_else(|| {
            warn!(
                "Unparsable price record {:?} in {:?}, treating as never notified",
                raw.trim(),
                self.path
            );
            PriceRecord::Never
        })
    }

    /// Replace the file with `price`. Written to a sibling temp file and renamed,
    /// so a crash mid-write never leaves an empty record behind.
    pub fn save(&self, price: f64) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".notified_price")
            .tempfile_in(dir)?;
        tmp.write_all(PriceRecord::Notified(price).to_string().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Saved notified price {:.2} to {:?}", price, self.path);
        Ok(())
    }
}

fn parse_record(raw: &str) -> Option<PriceRecord> {
    let s = raw.trim();
    if s == PriceRecord::NEVER_TOKEN {
        return Some(PriceRecord::Never);
    }
    let price: f64 = s.parse().ok()?;
    if price.is_finite() && price >= 0.0 {
        Some(PriceRecord::Notified(price))
    } else {
        None
    }
}
