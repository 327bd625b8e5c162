//! Error types for the spoofer collector core library.
//!
//! All fallible operations return [`SpooferResult`]. Errors carry a stable code
//! so log lines and CLI output can be matched against this table.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Api | Transport, HTTP status, payload and URL errors |
//! | E2001-E2099 | Config | Configuration file and validation errors |
//! | E3001-E3099 | Output | Output file and directory setup errors |
//! | E9001-E9099 | General | Internal and IO errors |

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculate the delay after a failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay as u64)
    }
}

/// The main error type for the spoofer collector.
#[derive(Debug, Error)]
pub enum SpooferError {
    // ========================================================================
    // Api Errors (E1001-E1099)
    // ========================================================================
    /// Transport or protocol failure while talking to the API
    #[error("[E1001] API request failed: {0}")]
    ApiRequestFailed(String),

    /// Response body is not a valid page document
    #[error("[E1002] Failed to parse API response: {0}")]
    ApiParseError(String),

    /// Non-success HTTP status
    #[error("[E1003] API returned status {status} for {url}")]
    ApiStatus { status: u16, url: String },

    /// Connection could not be established
    #[error("[E1004] API service unavailable: {0}")]
    ApiServiceUnavailable(String),

    /// Request exceeded the per-request timeout
    #[error("[E1005] API request timed out: {0}")]
    RequestTimeout(String),

    /// URL could not be built or parsed
    #[error("[E1006] Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // ========================================================================
    // Configuration Errors (E2001-E2099)
    // ========================================================================
    /// Configuration source could not be read or parsed
    #[error("[E2001] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// Configuration value failed validation
    #[error("[E2002] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    // ========================================================================
    // Output Errors (E3001-E3099)
    // ========================================================================
    /// Output file or its parent directory could not be created
    #[error("[E3001] Cannot prepare output '{path}': {message}")]
    OutputSetupFailed { path: String, message: String },

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    #[error("[E9002] IO error: {0}")]
    Io(String),
}

/// Result type alias for collector operations.
pub type SpooferResult<T> = Result<T, SpooferError>;

// ============================================================================
// From trait implementations for seamless error propagation
// ============================================================================

impl From<reqwest::Error> for SpooferError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SpooferError::RequestTimeout(err.to_string())
        } else if err.is_connect() {
            SpooferError::ApiServiceUnavailable(err.to_string())
        } else if err.is_status() {
            SpooferError::ApiStatus {
                status: err.status().map(|s| s.as_u16()).unwrap_or_default(),
                url: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            }
        } else if err.is_decode() {
            SpooferError::ApiParseError(err.to_string())
        } else {
            SpooferError::ApiRequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SpooferError {
    fn from(err: serde_json::Error) -> Self {
        SpooferError::ApiParseError(err.to_string())
    }
}

impl From<std::io::Error> for SpooferError {
    fn from(err: std::io::Error) -> Self {
        SpooferError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for SpooferError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => SpooferError::InvalidConfigValue {
                key,
                message: "Key not found".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => SpooferError::ConfigParseError(
                format!("Failed to parse {}: {}", uri.unwrap_or_default(), cause),
            ),
            config::ConfigError::Type {
                origin,
                unexpected,
                expected,
                key,
            } => SpooferError::InvalidConfigValue {
                key: key.unwrap_or_else(|| origin.map(|o| o.to_string()).unwrap_or_default()),
                message: format!("Expected {}, got {}", expected, unexpected),
            },
            _ => SpooferError::ConfigParseError(err.to_string()),
        }
    }
}

// ============================================================================
// Error categorization helpers
// ============================================================================

impl SpooferError {
    /// Returns true if the same request might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SpooferError::ApiRequestFailed(_)
                | SpooferError::ApiStatus { .. }
                | SpooferError::ApiServiceUnavailable(_)
                | SpooferError::RequestTimeout(_)
        )
    }

    /// Returns an error code suitable for logging or external reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            SpooferError::ApiRequestFailed(_) => "E1001",
            SpooferError::ApiParseError(_) => "E1002",
            SpooferError::ApiStatus { .. } => "E1003",
            SpooferError::ApiServiceUnavailable(_) => "E1004",
            SpooferError::RequestTimeout(_) => "E1005",
            SpooferError::InvalidUrl { .. } => "E1006",
            SpooferError::ConfigParseError(_) => "E2001",
            SpooferError::InvalidConfigValue { .. } => "E2002",
            SpooferError::OutputSetupFailed { .. } => "E3001",
            SpooferError::Internal(_) => "E9001",
            SpooferError::Io(_) => "E9002",
        }
    }

    /// Returns a user-friendly suggestion for how to resolve this error.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            SpooferError::ApiServiceUnavailable(_) | SpooferError::RequestTimeout(_) => {
                Some("Check network connectivity or point --api-base at a reachable mirror")
            }
            SpooferError::InvalidUrl { .. } => {
                Some("Pass an absolute http(s) URL to --api-base")
            }
            SpooferError::ConfigParseError(_) | SpooferError::InvalidConfigValue { .. } => {
                Some("Fix spoofer.toml or the SPOOFER_* environment variables")
            }
            SpooferError::OutputSetupFailed { .. } => {
                Some("Check that the output directory is writable")
            }
            _ => None,
        }
    }

    /// Log this error with appropriate severity level.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_transient() {
            warn!(
                error_code = %code,
                suggestion = suggestion,
                "Transient error occurred: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }
}

// ============================================================================
// Retry utilities
// ============================================================================

/// Suspends between retry attempts. Swapped out in tests to record delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Progress of a retried operation, handed to the caller's callback.
#[derive(Debug)]
pub enum RetryEvent<'a> {
    /// Attempt `attempt` (1-based) failed; the next one starts after `delay`.
    Retrying {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        error: &'a SpooferError,
    },
    /// No further attempts will be made.
    GaveUp {
        attempts: u32,
        error: &'a SpooferError,
    },
}

/// Execute an async operation under `policy`, sleeping through `sleeper`
/// between attempts. Non-transient errors stop the loop immediately.
pub async fn retry_with_backoff<F, Fut, T, N>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut on_event: N,
    operation: F,
) -> SpooferResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = SpooferResult<T>>,
    N: FnMut(RetryEvent<'_>),
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        "Operation succeeded on attempt {} after {} retries",
                        attempt + 1,
                        attempt
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_transient() || attempt == max_attempts - 1 {
                    e.log();
                    on_event(RetryEvent::GaveUp {
                        attempts: attempt + 1,
                        error: &e,
                    });
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                on_event(RetryEvent::Retrying {
                    attempt: attempt + 1,
                    max_attempts,
                    delay,
                    error: &e,
                });

                sleeper.sleep(delay).await;
            }
        }
    }

    Err(SpooferError::Internal(
        "Retry loop exhausted without error".to_string(),
    ))
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with suggestions.
pub struct CliErrorDisplay<'a> {
    error: &'a SpooferError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a SpooferError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
