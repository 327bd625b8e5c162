use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{
    retry_with_backoff, RetryEvent, RetryPolicy, Sleeper, SpooferResult, TokioSleeper,
};
use crate::models::SessionPage;

use super::observer::CollectionObserver;

/// Media type of the Hydra collection documents served by the API.
pub const ACCEPT_JSON_LD: &str = "application/ld+json";

/// One attempt at retrieving and decoding a page, without retries.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_page(&self, url: &Url) -> SpooferResult<SessionPage>;
}

pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(timeout: Duration) -> SpooferResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spoofer-collector/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get_page(&self, url: &Url) -> SpooferResult<SessionPage> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_JSON_LD)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<SessionPage>().await?)
    }
}

/// Bounded-retry page retrieval on top of a [`PageSource`].
pub struct PageFetcher<S> {
    source: S,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: PageSource> PageFetcher<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Fetch `url`, retrying transient failures. `None` means the page could
    /// not be obtained and the observer has already been told why.
    pub async fn fetch(&self, url: &Url, observer: &dyn CollectionObserver) -> Option<SessionPage> {
        retry_with_backoff(
            &self.policy,
            self.sleeper.as_ref(),
            |event| match event {
                RetryEvent::Retrying {
                    attempt,
                    max_attempts,
                    delay,
                    error,
                } => observer.on_retry(attempt, max_attempts, delay, error),
                RetryEvent::GaveUp { attempts, error } => observer.on_fetch_failed(attempts, error),
            },
            || self.source.get_page(url),
        )
        .await
        .ok()
    }
}
