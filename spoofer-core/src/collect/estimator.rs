//! Progress estimation from observed page throughput.
//!
//! [`estimate_eta`] is a pure function of elapsed time, pages processed and
//! the (optional) total page count. The total comes from the `page` query
//! parameter of the first `hydra:last` reference that yields one.

use reqwest::Url;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::models::SessionPage;

/// Base used to resolve relative `hydra:last` references before reading their query.
const REFERENCE_BASE: &str = "http://localhost/";

/// Minimum pages before a numeric estimate is produced.
const MIN_PAGES_FOR_ESTIMATE: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// Not enough data yet.
    Calculating,
    /// Time left, given a known total page count.
    Remaining(Duration),
    /// Pages per second, when the total page count is unknown.
    Throughput(f64),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Calculating => f.write_str("Calculating..."),
            Eta::Remaining(left) => {
                let secs = left.as_secs_f64();
                if secs < 60.0 {
                    write!(f, "{} seconds", secs as u64)
                } else if secs < 3600.0 {
                    write!(f, "{} minutes", (secs / 60.0) as u64)
                } else {
                    let hours = (secs / 3600.0) as u64;
                    let minutes = ((secs % 3600.0) / 60.0) as u64;
                    write!(f, "{} hours, {} minutes", hours, minutes)
                }
            }
            Eta::Throughput(rate) => write!(f, "Processing {:.2} pages/second", rate),
        }
    }
}

/// Project the remaining time from the average time per page so far.
///
/// An estimate that turned out too small (more pages processed than
/// estimated) reports zero time left rather than a negative duration. A
/// projection too large for a [`Duration`] saturates at [`Duration::MAX`].
pub fn estimate_eta(elapsed: Duration, pages_processed: u64, estimated_total: Option<u64>) -> Eta {
    if pages_processed < MIN_PAGES_FOR_ESTIMATE || elapsed.is_zero() {
        return Eta::Calculating;
    }

    let avg_secs_per_page = elapsed.as_secs_f64() / pages_processed as f64;

    match estimated_total {
        Some(total) => {
            let remaining_pages = total.saturating_sub(pages_processed);
            let remaining =
                Duration::try_from_secs_f64(remaining_pages as f64 * avg_secs_per_page)
                    .unwrap_or(Duration::MAX);
            Eta::Remaining(remaining)
        }
        None => Eta::Throughput(1.0 / avg_secs_per_page),
    }
}

/// Read the `page` query parameter of a pagination reference.
///
/// Returns `None` for anything unusable: unparseable reference, missing
/// parameter, non-numeric or zero value.
pub fn page_count_from_reference(reference: &str) -> Option<u64> {
    let url = Url::parse(reference)
        .or_else(|_| Url::parse(REFERENCE_BASE).and_then(|base| base.join(reference)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u64>().ok())
        .filter(|pages| *pages > 0)
}

/// Per-run throughput counters, owned by the collection driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pages_processed: u64,
    estimated_total_pages: Option<u64>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a fetched page. Returns the total page count when this page is
    /// the one that first made it known.
    pub fn record_page(&mut self, page: &SessionPage) -> Option<u64> {
        self.pages_processed += 1;

        if self.estimated_total_pages.is_some() {
            return None;
        }

        let reference = page.last_reference()?;
        match page_count_from_reference(reference) {
            Some(total) => {
                debug!(total_pages = total, "Estimated total pages from hydra:last");
                self.estimated_total_pages = Some(total);
                Some(total)
            }
            None => {
                debug!(reference, "Ignoring unusable hydra:last reference");
                None
            }
        }
    }

    pub fn pages_processed(&self) -> u64 {
        self.pages_processed
    }

    pub fn estimated_total_pages(&self) -> Option<u64> {
        self.estimated_total_pages
    }

    pub fn eta(&self, elapsed: Duration) -> Eta {
        estimate_eta(elapsed, self.pages_processed, self.estimated_total_pages)
    }
}
