use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RetryPolicy, SpooferError, SpooferResult};

pub const DEFAULT_API_BASE: &str = "https://api.spoofer.caida.org";
pub const DEFAULT_ROUTED_OUTPUT: &str = "ipv4_routed_spoofers.txt";
pub const DEFAULT_PRIVATE_OUTPUT: &str = "ipv4_private_spoofers.txt";

/// Longest accepted collection window, roughly a century.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CollectorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_routed_path")]
    pub routed_path: PathBuf,

    #[serde(default = "default_private_path")]
    pub private_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    2
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    60
}

fn default_routed_path() -> PathBuf {
    PathBuf::from(DEFAULT_ROUTED_OUTPUT)
}

fn default_private_path() -> PathBuf {
    PathBuf::from(DEFAULT_PRIVATE_OUTPUT)
}

fn default_lookback_days() -> u32 {
    365
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            routed_path: default_routed_path(),
            private_path: default_private_path(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            max_delay: Duration::from_secs(settings.max_delay_secs),
            backoff_multiplier: settings.backoff_multiplier,
        }
    }
}

impl CollectionConfig {
    /// First day of the collection window, `lookback_days` before `now`, as `YYYY-MM-DD`.
    pub fn start_date<Tz: TimeZone>(&self, now: DateTime<Tz>) -> SpooferResult<String>
    where
        Tz::Offset: std::fmt::Display,
    {
        ChronoDuration::try_days(i64::from(self.lookback_days))
            .and_then(|window| now.checked_sub_signed(window))
            .map(|start| start.format("%Y-%m-%d").to_string())
            .ok_or_else(|| SpooferError::InvalidConfigValue {
                key: "collection.lookback_days".to_string(),
                message: format!("{} days reaches before the earliest date", self.lookback_days),
            })
    }
}

impl CollectorConfig {
    /// Load defaults, config files, `.env` files and `SPOOFER_*` variables.
    /// `extra` is a file named on the command line and must exist.
    ///
    /// The result is not validated; call [`CollectorConfig::validate`] once
    /// every override has been applied.
    pub fn load(extra: Option<&Path>) -> SpooferResult<Self> {
        Self::load_from_paths(get_config_paths(), extra)
    }

    pub fn load_from_paths(paths: Vec<PathBuf>, extra: Option<&Path>) -> SpooferResult<Self> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SPOOFER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> SpooferResult<()> {
        match reqwest::Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(SpooferError::InvalidConfigValue {
                    key: "api.base_url".to_string(),
                    message: format!("Unsupported scheme '{}'", url.scheme()),
                })
            }
            Err(e) => {
                return Err(SpooferError::InvalidConfigValue {
                    key: "api.base_url".to_string(),
                    message: e.to_string(),
                })
            }
        }

        if self.api.request_timeout_secs == 0 {
            return Err(SpooferError::InvalidConfigValue {
                key: "api.request_timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(SpooferError::InvalidConfigValue {
                key: "retry.max_attempts".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.collection.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SpooferError::InvalidConfigValue {
                key: "collection.lookback_days".to_string(),
                message: format!("Must be at most {}", MAX_LOOKBACK_DAYS),
            });
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(SpooferError::InvalidConfigValue {
                key: "retry.backoff_multiplier".to_string(),
                message: "Must be 1.0 or greater".to_string(),
            });
        }

        for (key, path) in [
            ("output.routed_path", &self.output.routed_path),
            ("output.private_path", &self.output.private_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(SpooferError::InvalidConfigValue {
                    key: key.to_string(),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(SpooferError::InvalidConfigValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("spoofer.toml"));
        paths.push(cwd.join("config").join("local.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("spoofer").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".spoofer").join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
        paths.push(cwd.join(".env.local"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".spoofer").join(".env"));
    }

    for path in paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}
