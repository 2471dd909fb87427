//! Download outcomes and the aggregated page/batch result tree.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::DownloadError;

/// Longest `Unknown` message kept before truncation.
const UNKNOWN_MESSAGE_LIMIT: usize = 50;

/// Stable, groupable reason an image failed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum FailureReason {
    ConnectionTimeout,
    ConnectionRefused,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    UnexpectedStatus(u16),
    InvalidImageContent,
    Interrupted,
    Unknown(String),
}

impl FailureReason {
    /// Build an `Unknown` reason, truncating long messages.
    pub fn unknown(message: impl AsRef<str>) -> Self {
        let message = message.as_ref();
        if message.chars().count() > UNKNOWN_MESSAGE_LIMIT {
            let head: String = message.chars().take(UNKNOWN_MESSAGE_LIMIT).collect();
            Self::Unknown(format!("{head}..."))
        } else {
            Self::Unknown(message.to_string())
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            403 => Self::Forbidden,
            429 => Self::RateLimited,
            503 => Self::ServiceUnavailable,
            other => Self::UnexpectedStatus(other),
        }
    }
}

impl From<&DownloadError> for FailureReason {
    fn from(err: &DownloadError) -> Self {
        match err {
            DownloadError::Timeout { .. } => Self::ConnectionTimeout,
            DownloadError::Connect { .. } => Self::ConnectionRefused,
            DownloadError::Status { status, .. } => Self::from_status(*status),
            DownloadError::RateLimited { .. } => Self::RateLimited,
            DownloadError::InvalidImage { .. } => Self::InvalidImageContent,
            DownloadError::Interrupted { .. } => Self::Interrupted,
            DownloadError::RedirectLimit { .. } => Self::unknown("redirect limit exceeded"),
            DownloadError::Io { source, .. } => Self::unknown(source.to_string()),
            DownloadError::Other { message, .. } => Self::unknown(message),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionTimeout => f.write_str("ConnectionTimeout"),
            Self::ConnectionRefused => f.write_str("ConnectionRefused"),
            Self::Forbidden => f.write_str("Forbidden(403)"),
            Self::RateLimited => f.write_str("RateLimited(429)"),
            Self::ServiceUnavailable => f.write_str("ServiceUnavailable(503)"),
            Self::UnexpectedStatus(code) => write!(f, "UnexpectedStatus({code})"),
            Self::InvalidImageContent => f.write_str("InvalidImageContent"),
            Self::Interrupted => f.write_str("Interrupted"),
            Self::Unknown(message) => write!(f, "Unknown({message})"),
        }
    }
}

/// Result of downloading one image.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub url: String,
    pub success: bool,
    pub saved_path: Option<PathBuf>,
    pub failure_reason: Option<FailureReason>,
    /// Attempts spent on the final hop of the redirect chain
    pub attempts: u32,
    pub duration_ms: u64,
}

impl DownloadOutcome {
    pub fn saved(url: impl Into<String>, path: PathBuf, attempts: u32, duration_ms: u64) -> Self {
        Self {
            url: url.into(),
            success: true,
            saved_path: Some(path),
            failure_reason: None,
            attempts,
            duration_ms,
        }
    }

    pub fn failed(
        url: impl Into<String>,
        reason: FailureReason,
        attempts: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            url: url.into(),
            success: false,
            saved_path: None,
            failure_reason: Some(reason),
            attempts,
            duration_ms,
        }
    }
}

/// Watermark processing summary for one page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatermarkStats {
    pub enabled: bool,
    pub provider: String,
    pub processed_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub avg_process_time_ms: u64,
    pub failure_reasons: Vec<String>,
    #[serde(skip)]
    total_time_ms: u64,
}

impl WatermarkStats {
    pub fn new(provider: impl Into<String>, enabled: bool) -> Self {
        Self {
            enabled,
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Record one provider call that was actually attempted.
    pub fn record(&mut self, success: bool, duration_ms: u64, error: Option<&str>) {
        self.processed_count += 1;
        self.total_time_ms += duration_ms;
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
            if let Some(message) = error {
                self.failure_reasons.push(message.to_string());
            }
        }
        self.avg_process_time_ms = self.total_time_ms / self.processed_count as u64;
    }
}

/// Aggregated outcome of one page job.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub url: String,
    pub success: bool,
    pub message: String,
    pub total_count: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub save_path: Option<PathBuf>,
    pub failed_urls: Vec<String>,
    pub outcomes: Vec<DownloadOutcome>,
    /// Failure reason label to occurrence count
    pub failure_summary: BTreeMap<String, usize>,
    pub duration_ms: u64,
    pub watermark_stats: Option<WatermarkStats>,
}

impl PageResult {
    /// A page that failed before any image was attempted.
    pub fn failed(url: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            url: url.into(),
            success: false,
            message: message.into(),
            total_count: 0,
            success_count: 0,
            fail_count: 0,
            save_path: None,
            failed_urls: Vec::new(),
            outcomes: Vec::new(),
            failure_summary: BTreeMap::new(),
            duration_ms,
            watermark_stats: None,
        }
    }

    /// Aggregate per-image outcomes into a successful page result.
    pub fn from_outcomes(
        url: impl Into<String>,
        save_path: PathBuf,
        outcomes: Vec<DownloadOutcome>,
        duration_ms: u64,
    ) -> Self {
        let total_count = outcomes.len();
        let success_count = outcomes.iter().filter(|o| o.success).count();
        let mut failed_urls = Vec::new();
        let mut failure_summary = BTreeMap::new();
        for outcome in outcomes.iter().filter(|o| !o.success) {
            failed_urls.push(outcome.url.clone());
            let label = outcome
                .failure_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "Unknown".to_string());
            *failure_summary.entry(label).or_insert(0) += 1;
        }

        let message = if total_count == 0 {
            "no images found".to_string()
        } else {
            format!("downloaded {success_count}/{total_count} images")
        };

        Self {
            url: url.into(),
            success: true,
            message,
            total_count,
            success_count,
            fail_count: total_count - success_count,
            save_path: Some(save_path),
            failed_urls,
            outcomes,
            failure_summary,
            duration_ms,
            watermark_stats: None,
        }
    }

    /// Human-readable failure histogram, e.g. `Forbidden(403): 2, ConnectionTimeout: 1`.
    pub fn failure_summary_message(&self) -> String {
        let mut entries: Vec<_> = self.failure_summary.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries
            .into_iter()
            .map(|(label, count)| format!("{label}: {count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Aggregated outcome of a batch of page jobs.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
    pub total_pages: usize,
    pub success_pages: usize,
    pub fail_pages: usize,
    pub total_images: usize,
    pub success_images: usize,
    pub fail_images: usize,
    pub total_duration_ms: u64,
    /// In submission order
    pub page_results: Vec<PageResult>,
}
