//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Providers the watermark service knows how to build.
pub const KNOWN_PROVIDERS: &[&str] = &["disabled", "baidu", "tencent"];

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Image download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// HTML page fetching and pagination
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Batch orchestration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Output directory layout
    #[serde(default)]
    pub output: OutputConfig,

    /// Remote watermark removal
    #[serde(default)]
    pub watermark: WatermarkConfig,

    /// Logging preferences
    #[serde(default)]
    pub logging: LoggingConfig,
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

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.download.user_agent.trim().is_empty() {
            return Err(AppError::validation("download.user_agent is empty"));
        }
        if self.download.base_path.trim().is_empty() {
            return Err(AppError::validation("download.base_path is empty"));
        }
        if self.download.connect_timeout_ms == 0 || self.download.read_timeout_ms == 0 {
            return Err(AppError::validation("download timeouts must be > 0"));
        }
        if self.download.max_retry == 0 {
            return Err(AppError::validation("download.max_retry must be > 0"));
        }
        if self.crawl.page_timeout_ms == 0 {
            return Err(AppError::validation("crawl.page_timeout_ms must be > 0"));
        }
        if self.crawl.page_size == 0 {
            return Err(AppError::validation("crawl.page_size must be > 0"));
        }
        if self.batch.max_concurrency == 0 {
            return Err(AppError::validation("batch.max_concurrency must be > 0"));
        }
        if !KNOWN_PROVIDERS.contains(&self.watermark.default_provider.as_str()) {
            return Err(AppError::validation(format!(
                "watermark.default_provider '{}' is not one of {:?}",
                self.watermark.default_provider, KNOWN_PROVIDERS
            )));
        }
        Ok(())
    }
}

/// HTTP settings for image downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for downloaded images
    #[serde(default = "defaults::base_path")]
    pub base_path: String,

    /// User-Agent header for all requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::accept")]
    pub accept: String,

    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// TCP/TLS connect deadline
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Deadline for the whole response
    #[serde(default = "defaults::read_timeout")]
    pub read_timeout_ms: u64,

    /// Attempts per image, including the first
    #[serde(default = "defaults::max_retry")]
    pub max_retry: u32,

    /// First backoff step; doubles on every failed attempt
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Pause before each image on a page
    #[serde(default = "defaults::request_interval")]
    pub request_interval_ms: u64,

    /// Hop limit for 301/302/303 chains
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: u32,

    /// Upper bound on a server-sent `Retry-After`
    #[serde(default = "defaults::max_retry_after")]
    pub max_retry_after_secs: u64,
}

impl DownloadConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_path: defaults::base_path(),
            user_agent: defaults::user_agent(),
            accept: defaults::accept(),
            accept_language: defaults::accept_language(),
            connect_timeout_ms: defaults::connect_timeout(),
            read_timeout_ms: defaults::read_timeout(),
            max_retry: defaults::max_retry(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            request_interval_ms: defaults::request_interval(),
            max_redirects: defaults::max_redirects(),
            max_retry_after_secs: defaults::max_retry_after(),
        }
    }
}

/// HTML page fetching and pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Timeout for fetching an HTML page
    #[serde(default = "defaults::page_timeout")]
    pub page_timeout_ms: u64,

    /// Page cap when a job does not set one
    #[serde(default = "defaults::max_pages")]
    pub default_max_pages: usize,

    /// Delay between pages of one crawl
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Items per page assumed by synthetic pagination
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,
}

impl CrawlConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_timeout_ms: defaults::page_timeout(),
            default_max_pages: defaults::max_pages(),
            page_delay_ms: defaults::page_delay(),
            page_size: defaults::page_size(),
        }
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "defaults::max_concurrency")]
    pub max_concurrency: usize,

    /// How long in-flight pages may run after cancellation before being aborted
    #[serde(default = "defaults::shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::max_concurrency(),
            shutdown_grace_secs: defaults::shutdown_grace(),
        }
    }
}

/// Output directory layout defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Append a timestamp sub-directory
    #[serde(default = "defaults::yes")]
    pub use_timestamp: bool,

    /// strftime pattern for the timestamp sub-directory
    #[serde(default = "defaults::timestamp_format")]
    pub timestamp_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_timestamp: true,
            timestamp_format: defaults::timestamp_format(),
        }
    }
}

/// Remote watermark removal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Master switch; an explicit per-job provider still works when off
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::provider")]
    pub default_provider: String,

    #[serde(default)]
    pub save_original: bool,

    /// Timeout for each provider API call
    #[serde(default = "defaults::watermark_timeout")]
    pub timeout_ms: u64,

    /// Retries after the first provider call
    #[serde(default = "defaults::watermark_retry")]
    pub max_retry: u32,

    #[serde(default = "defaults::watermark_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub baidu: BaiduConfig,

    #[serde(default)]
    pub tencent: TencentConfig,
}

impl WatermarkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_provider: defaults::provider(),
            save_original: false,
            timeout_ms: defaults::watermark_timeout(),
            max_retry: defaults::watermark_retry(),
            retry_delay_ms: defaults::watermark_retry_delay(),
            baidu: BaiduConfig::default(),
            tencent: TencentConfig::default(),
        }
    }
}

/// Baidu image-process API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaiduConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "defaults::baidu_endpoint")]
    pub endpoint: String,
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            secret_key: String::new(),
            endpoint: defaults::baidu_endpoint(),
        }
    }
}

/// Tencent Cloud TIIA credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TencentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "defaults::tencent_region")]
    pub region: String,
    #[serde(default = "defaults::tencent_endpoint")]
    pub endpoint: String,
}

impl Default for TencentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_id: String::new(),
            secret_key: String::new(),
            region: defaults::tencent_region(),
            endpoint: defaults::tencent_endpoint(),
        }
    }
}

/// Logging preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Download defaults
    pub fn base_path() -> String {
        "./downloads".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn accept() -> String {
        "image/webp,image/apng,image/*,*/*;q=0.8".into()
    }
    pub fn accept_language() -> String {
        "zh-CN,zh;q=0.9,en;q=0.8".into()
    }
    pub fn connect_timeout() -> u64 {
        10_000
    }
    pub fn read_timeout() -> u64 {
        60_000
    }
    pub fn max_retry() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        1_000
    }
    pub fn request_interval() -> u64 {
        500
    }
    pub fn max_redirects() -> u32 {
        5
    }
    pub fn max_retry_after() -> u64 {
        300
    }

    // Crawl defaults
    pub fn page_timeout() -> u64 {
        30_000
    }
    pub fn max_pages() -> usize {
        50
    }
    pub fn page_delay() -> u64 {
        1_000
    }
    pub fn page_size() -> usize {
        30
    }

    // Batch defaults
    pub fn max_concurrency() -> usize {
        3
    }
    pub fn shutdown_grace() -> u64 {
        60
    }

    // Output defaults
    pub fn yes() -> bool {
        true
    }
    pub fn timestamp_format() -> String {
        "%Y%m%d_%H%M%S".into()
    }

    // Watermark defaults
    pub fn provider() -> String {
        "disabled".into()
    }
    pub fn watermark_timeout() -> u64 {
        30_000
    }
    pub fn watermark_retry() -> u32 {
        2
    }
    pub fn watermark_retry_delay() -> u64 {
        2_000
    }
    pub fn baidu_endpoint() -> String {
        "https://aip.baidubce.com".into()
    }
    pub fn tencent_region() -> String {
        "ap-shanghai".into()
    }
    pub fn tencent_endpoint() -> String {
        "https://tiia.tencentcloudapi.com".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
