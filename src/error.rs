// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Page fetching/crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },

    /// Watermark provider error
    #[error("Watermark provider '{provider}': {message}")]
    Watermark { provider: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a watermark provider error.
    pub fn watermark(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Watermark {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single image download attempt.
///
/// Produced inside the downloader state machine; converted to a
/// [`FailureReason`](crate::models::FailureReason) when it reaches a result record.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Connect or read deadline elapsed.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// Connection could not be established.
    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// Non-200 response that is not a redirect or rate limit.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// HTTP 429, with the server's `Retry-After` in seconds when present.
    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<u64>,
    },

    /// Body could not be decoded as an image.
    #[error("invalid image content from {url}: {message}")]
    InvalidImage { url: String, message: String },

    /// Redirect chain exceeded the hop limit.
    #[error("too many redirects starting at {url}")]
    RedirectLimit { url: String },

    /// Cancelled while waiting on the network or a backoff sleep.
    #[error("download of {url} interrupted")]
    Interrupted { url: String },

    /// Writing the image to disk failed.
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else the transport reports.
    #[error("request to {url} failed: {message}")]
    Other { url: String, message: String },
}

impl DownloadError {
    /// Classify a transport error the way the downloader reports it.
    pub fn from_reqwest(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Other {
                url,
                message: err.to_string(),
            }
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Interrupted { .. } | Self::RedirectLimit { .. } | Self::Io { .. }
        )
    }

    /// Server-provided delay for rate limited responses.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let url = "https://img.example.com/a.jpg".to_string();
        assert!(DownloadError::Timeout { url: url.clone() }.is_retryable());
        assert!(
            DownloadError::Status {
                url: url.clone(),
                status: 403
            }
            .is_retryable()
        );
        assert!(
            DownloadError::InvalidImage {
                url: url.clone(),
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!DownloadError::Interrupted { url: url.clone() }.is_retryable());
        assert!(!DownloadError::RedirectLimit { url }.is_retryable());
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let limited = DownloadError::RateLimited {
            url: "u".into(),
            retry_after: Some(3),
        };
        assert_eq!(limited.retry_after(), Some(3));
        assert_eq!(DownloadError::Timeout { url: "u".into() }.retry_after(), None);
    }
}
