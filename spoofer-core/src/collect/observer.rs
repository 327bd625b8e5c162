use std::path::Path;
use std::time::Duration;

use crate::error::SpooferError;

use super::driver::CollectionSummary;
use super::estimator::Eta;

/// Counters shown on the live progress line after each page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub page: u64,
    pub records_seen: u64,
    pub routed_matches: u64,
    pub private_matches: u64,
    pub eta: Eta,
}

/// Receives collection events. Every method defaults to a no-op so callers
/// only implement what they display.
pub trait CollectionObserver: Send + Sync {
    fn on_start(&self, _start_date: &str, _routed_path: &Path, _private_path: &Path) {}

    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _delay: Duration, _error: &SpooferError) {
    }

    fn on_fetch_failed(&self, _attempts: u32, _error: &SpooferError) {}

    fn on_total_pages_estimated(&self, _total_pages: u64) {}

    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}

    /// Collection is stopping early; partial output is kept.
    fn on_stopped(&self) {}

    fn on_finished(&self, _summary: &CollectionSummary) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CollectionObserver for NoopObserver {}
