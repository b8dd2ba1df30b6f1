//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Rate limiter polling and jitter
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Sweep loop timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Error threshold alerting
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Processed-listing retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Notification formatting
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Storage root: an explicit override wins over `[paths].storage_dir`.
    pub fn storage_dir(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.paths.storage_dir.clone(), Path::to_path_buf)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("crawler.user_agents is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.limiter.poll_interval_secs == 0 {
            return Err(AppError::validation(
                "limiter.poll_interval_secs must be > 0",
            ));
        }
        if self.limiter.max_wait_secs < self.limiter.poll_interval_secs {
            return Err(AppError::validation(
                "limiter.max_wait_secs must be >= limiter.poll_interval_secs",
            ));
        }
        let [low, high] = self.limiter.post_wait_jitter_secs;
        if low > high {
            return Err(AppError::validation(
                "limiter.post_wait_jitter_secs must be [low, high] with low <= high",
            ));
        }
        if self.alerts.threshold == 0 {
            return Err(AppError::validation("alerts.threshold must be > 0"));
        }
        if self.alerts.window_secs == 0 {
            return Err(AppError::validation("alerts.window_secs must be > 0"));
        }
        if self.retention.days == 0 {
            return Err(AppError::validation("retention.days must be > 0"));
        }
        Ok(())
    }
}

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent pool; one is picked at random per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Sleep after a throttling response without a usable Retry-After
    #[serde(default = "defaults::throttle_backoff")]
    pub throttle_backoff_secs: u64,

    /// Lifetime of cached detail pages
    #[serde(default = "defaults::cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            throttle_backoff_secs: defaults::throttle_backoff(),
            cache_ttl_secs: defaults::cache_ttl(),
        }
    }
}

impl CrawlerConfig {
    pub fn throttle_backoff(&self) -> Duration {
        Duration::from_secs(self.throttle_backoff_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Rate limiter wait behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Sleep between admission attempts while the window is full
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up acquiring after this long
    #[serde(default = "defaults::max_wait")]
    pub max_wait_secs: u64,

    /// Upper bound of the random sleep before every attempt
    #[serde(default = "defaults::pre_jitter")]
    pub pre_jitter_ms: u64,

    /// Random sleep range after an acquisition that had to wait
    #[serde(default = "defaults::post_wait_jitter")]
    pub post_wait_jitter_secs: [u64; 2],
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
            max_wait_secs: defaults::max_wait(),
            pre_jitter_ms: defaults::pre_jitter(),
            post_wait_jitter_secs: defaults::post_wait_jitter(),
        }
    }
}

/// Sweep loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between two sweeps
    #[serde(default = "defaults::sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: defaults::sweep_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Admin alert settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Errors within the window that trigger an alert
    #[serde(default = "defaults::alert_threshold")]
    pub threshold: usize,

    /// Trailing window in seconds
    #[serde(default = "defaults::alert_window")]
    pub window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::alert_threshold(),
            window_secs: defaults::alert_window(),
        }
    }
}

impl AlertConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Processed-listing retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Drop entries not seen for this many days
    #[serde(default = "defaults::retention_days")]
    pub days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: defaults::retention_days(),
        }
    }
}

impl RetentionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.days)
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of filters.json and processed.json
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,

    /// Raw bodies of pages that kept failing validation
    #[serde(default = "defaults::diagnostics_dir")]
    pub diagnostics_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
            diagnostics_dir: defaults::diagnostics_dir(),
        }
    }
}

/// Notification formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Template for match notifications, see `Listing::format`
    #[serde(default = "defaults::notify_template")]
    pub template: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            template: defaults::notify_template(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15".into(),
            "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
        ]
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn throttle_backoff() -> u64 {
        30
    }
    pub fn cache_ttl() -> u64 {
        24 * 60 * 60
    }

    // Limiter defaults
    pub fn poll_interval() -> u64 {
        10
    }
    pub fn max_wait() -> u64 {
        10 * 60
    }
    pub fn pre_jitter() -> u64 {
        1000
    }
    pub fn post_wait_jitter() -> [u64; 2] {
        [1, 60]
    }

    // Scheduler defaults
    pub fn sweep_interval() -> u64 {
        60
    }

    // Alert defaults
    pub fn alert_threshold() -> usize {
        2
    }
    pub fn alert_window() -> u64 {
        60 * 60
    }

    pub fn retention_days() -> i64 {
        31
    }

    // Path defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn diagnostics_dir() -> PathBuf {
        PathBuf::from("storage/diagnostics")
    }

    pub fn notify_template() -> String {
        "[{title}] {link} | {price} | {date}".into()
    }
}
