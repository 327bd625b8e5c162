use chrono::{DateTime, Local, TimeZone};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::error::{RetryPolicy, Sleeper, SpooferError, SpooferResult};
use crate::models::SessionPage;

use super::classifier::match_record;
use super::estimator::ProgressState;
use super::fetcher::{HttpPageSource, PageFetcher, PageSource};
use super::observer::{CollectionObserver, ProgressSnapshot};
use super::output::{HeaderContext, OutputFiles, OutputKind};

/// Collection endpoint, relative to the API base.
pub const SESSIONS_PATH: &str = "/sessions";

/// Everything a run needs besides the transport.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub api_base: Url,
    /// First day of the window, `YYYY-MM-DD`.
    pub start_date: String,
    pub routed_path: PathBuf,
    pub private_path: PathBuf,
}

impl CollectorSettings {
    pub fn from_config<Tz: TimeZone>(config: &CollectorConfig, now: DateTime<Tz>) -> SpooferResult<Self>
    where
        Tz::Offset: fmt::Display,
    {
        let api_base =
            Url::parse(&config.api.base_url).map_err(|e| SpooferError::InvalidUrl {
                url: config.api.base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            api_base,
            start_date: config.collection.start_date(now)?,
            routed_path: config.output.routed_path.clone(),
            private_path: config.output.private_path.clone(),
        })
    }
}

/// Turn a pagination reference into a request URL. Absolute references are
/// used as-is; relative ones are appended to the API base, keeping any path
/// prefix the base carries.
pub fn resolve_reference(api_base: &Url, reference: &str) -> SpooferResult<Url> {
    if let Ok(url) = Url::parse(reference) {
        return Ok(url);
    }

    let base = api_base.as_str().trim_end_matches('/');
    let joined = if reference.starts_with('/') {
        format!("{}{}", base, reference)
    } else {
        format!("{}/{}", base, reference)
    };

    Url::parse(&joined).map_err(|e| SpooferError::InvalidUrl {
        url: joined.clone(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// The last page had no continuation reference.
    Completed,
    /// A page could not be fetched; output holds everything before it.
    FetchFailed,
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub outcome: CollectionOutcome,
    pub start_date: String,
    pub total_records: u64,
    pub routed_matches: u64,
    pub private_matches: u64,
    pub pages_processed: u64,
    pub estimated_total_pages: Option<u64>,
    pub routed_path: PathBuf,
    pub private_path: PathBuf,
    pub elapsed: Duration,
}

impl CollectionSummary {
    pub fn is_complete(&self) -> bool {
        self.outcome == CollectionOutcome::Completed
    }

    /// Elapsed wall-clock time as `H:MM:SS`.
    pub fn elapsed_hms(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Mutable state of one collection run.
#[derive(Debug)]
pub struct RunState {
    /// 1-based number of the page being fetched.
    pub page: u64,
    pub records_seen: u64,
    pub routed_matches: u64,
    pub private_matches: u64,
    pub started: Instant,
    pub progress: ProgressState,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            page: 1,
            records_seen: 0,
            routed_matches: 0,
            private_matches: 0,
            started: Instant::now(),
            progress: ProgressState::new(),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            page: self.page,
            records_seen: self.records_seen,
            routed_matches: self.routed_matches,
            private_matches: self.private_matches,
            eta: self.progress.eta(self.started.elapsed()),
        }
    }

    fn into_summary(self, outcome: CollectionOutcome, settings: &CollectorSettings) -> CollectionSummary {
        CollectionSummary {
            outcome,
            start_date: settings.start_date.clone(),
            total_records: self.records_seen,
            routed_matches: self.routed_matches,
            private_matches: self.private_matches,
            pages_processed: self.progress.pages_processed(),
            estimated_total_pages: self.progress.estimated_total_pages(),
            routed_path: settings.routed_path.clone(),
            private_path: settings.private_path.clone(),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Classify every record of `page`, append matches, and update the counters.
fn process_page(
    page: &SessionPage,
    state: &mut RunState,
    outputs: &mut OutputFiles,
) -> SpooferResult<()> {
    let mut routed = 0;
    let mut private = 0;

    for matched in page.members.iter().filter_map(match_record) {
        if matched.classification.routed {
            outputs.append(OutputKind::Routed, &matched.line)?;
            routed += 1;
        }
        if matched.classification.private {
            outputs.append(OutputKind::Private, &matched.line)?;
            private += 1;
        }
    }

    state.records_seen += page.members.len() as u64;
    state.routed_matches += routed;
    state.private_matches += private;

    debug!(
        page = state.page,
        records = page.members.len(),
        routed,
        private,
        "Processed page"
    );
    Ok(())
}

/// Walks the `hydra:next` chain from the start date to the last page.
pub struct Collector<S> {
    fetcher: PageFetcher<S>,
    settings: CollectorSettings,
}

impl Collector<HttpPageSource> {
    /// Collector over HTTP, with the window ending now (local time).
    pub fn from_config(config: &CollectorConfig) -> SpooferResult<Self> {
        let settings = CollectorSettings::from_config(config, Local::now())?;
        let source = HttpPageSource::new(config.request_timeout())?;
        Ok(Self::new(source, config.retry_policy(), settings))
    }
}

impl<S: PageSource> Collector<S> {
    pub fn new(source: S, policy: RetryPolicy, settings: CollectorSettings) -> Self {
        Self {
            fetcher: PageFetcher::new(source, policy),
            settings,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.fetcher = self.fetcher.with_sleeper(sleeper);
        self
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn initial_url(&self) -> SpooferResult<Url> {
        resolve_reference(
            &self.settings.api_base,
            &format!(
                "{}?timestamp[after]={}",
                SESSIONS_PATH, self.settings.start_date
            ),
        )
    }

    /// Run one collection. A page that cannot be fetched ends the run early
    /// with [`CollectionOutcome::FetchFailed`]; only output setup and write
    /// failures are returned as errors.
    pub async fn run(&self, observer: &dyn CollectionObserver) -> SpooferResult<CollectionSummary> {
        let settings = &self.settings;
        let mut url = self.initial_url()?;

        let header = HeaderContext {
            collected_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            start_date: settings.start_date.clone(),
        };
        let mut outputs = OutputFiles::create(&settings.routed_path, &settings.private_path, &header)?;
        let mut state = RunState::new();

        info!(
            start_date = %settings.start_date,
            api_base = %settings.api_base,
            "Starting data collection"
        );
        observer.on_start(
            &settings.start_date,
            outputs.routed_path(),
            outputs.private_path(),
        );

        let outcome = loop {
            let Some(page) = self.fetcher.fetch(&url, observer).await else {
                break CollectionOutcome::FetchFailed;
            };

            if let Some(total) = state.progress.record_page(&page) {
                observer.on_total_pages_estimated(total);
            }

            process_page(&page, &mut state, &mut outputs)?;
            observer.on_progress(&state.snapshot());

            let Some(reference) = page.next_reference() else {
                break CollectionOutcome::Completed;
            };

            match resolve_reference(&settings.api_base, reference) {
                Ok(next) => {
                    url = next;
                    state.page += 1;
                }
                Err(e) => {
                    warn!(reference, "Unusable hydra:next reference");
                    e.log();
                    break CollectionOutcome::FetchFailed;
                }
            }
        };

        if outcome == CollectionOutcome::FetchFailed {
            observer.on_stopped();
        }

        outputs.finish()?;

        let summary = state.into_summary(outcome, settings);
        info!(
            outcome = ?summary.outcome,
            records = summary.total_records,
            routed = summary.routed_matches,
            private = summary.private_matches,
            pages = summary.pages_processed,
            "Data collection finished in {}",
            summary.elapsed_hms()
        );
        observer.on_finished(&summary);

        Ok(summary)
    }
}
