// src/services/watermark/mod.rs

//! Remote watermark removal.
//!
//! Each vendor is a [`WatermarkProvider`] strategy registered by name; the
//! [`WatermarkService`] resolves which one a request uses, retries it, and
//! writes the cleaned image next to (never over) the original.

mod baidu;
mod tencent;

pub use baidu::BaiduProvider;
pub use tencent::TencentProvider;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::WatermarkConfig;
use crate::utils::interruptible_sleep;

/// Provider name meaning "do nothing".
pub const DISABLED: &str = "disabled";

/// A vendor API that turns an image into a watermark-free copy.
#[async_trait]
pub trait WatermarkProvider: Send + Sync {
    /// Registry key, e.g. `baidu`.
    fn name(&self) -> &str;

    /// Enabled and configured with credentials.
    fn is_available(&self) -> bool;

    /// Return the cleaned image bytes.
    async fn remove(&self, image: &[u8]) -> Result<Vec<u8>>;
}

/// Outcome of one watermark removal request.
#[derive(Debug, Clone, Serialize)]
pub struct WatermarkResult {
    pub success: bool,
    pub result_file: Option<PathBuf>,
    pub error_message: Option<String>,
    pub provider_used: String,
    pub duration_ms: u64,
}

impl WatermarkResult {
    fn not_enabled(reason: &str) -> Self {
        Self {
            success: false,
            result_file: None,
            error_message: Some(reason.to_string()),
            provider_used: DISABLED.to_string(),
            duration_ms: 0,
        }
    }

    fn failed(provider: &str, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            result_file: None,
            error_message: Some(message.into()),
            provider_used: provider.to_string(),
            duration_ms,
        }
    }

    /// Whether a provider was actually invoked.
    pub fn was_attempted(&self) -> bool {
        self.provider_used != DISABLED
    }
}

/// Provider registry plus retry and usage accounting.
pub struct WatermarkService {
    enabled: bool,
    default_provider: String,
    max_retry: u32,
    retry_delay: Duration,
    providers: HashMap<String, Arc<dyn WatermarkProvider>>,
    usage: HashMap<String, AtomicUsize>,
    token: CancellationToken,
}

impl WatermarkService {
    /// An empty registry using the retry and selection settings of `config`.
    pub fn new(config: &WatermarkConfig, token: CancellationToken) -> Self {
        Self {
            enabled: config.enabled,
            default_provider: config.default_provider.clone(),
            max_retry: config.max_retry,
            retry_delay: config.retry_delay(),
            providers: HashMap::new(),
            usage: HashMap::new(),
            token,
        }
    }

    /// Registry with the built-in vendors.
    pub fn from_config(config: &WatermarkConfig, token: CancellationToken) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;

        let mut service = Self::new(config, token);
        service.register(Arc::new(BaiduProvider::new(
            client.clone(),
            config.baidu.clone(),
        )));
        service.register(Arc::new(TencentProvider::new(client, config.tencent.clone())));
        Ok(service)
    }

    pub fn register(&mut self, provider: Arc<dyn WatermarkProvider>) {
        let name = provider.name().to_string();
        self.usage.entry(name.clone()).or_default();
        self.providers.insert(name, provider);
    }

    /// Provider a request would use; `disabled` when none applies.
    pub fn resolve_provider(&self, requested: Option<&str>) -> String {
        match requested {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ if self.enabled => self.default_provider.clone(),
            _ => DISABLED.to_string(),
        }
    }

    /// Remove the watermark from `input`, writing `output_dir/<input file name>`.
    ///
    /// `input` is only ever read. `keep_original` is accepted for callers that
    /// track it; the original always stays where it is.
    pub async fn remove_watermark(
        &self,
        input: &Path,
        output_dir: &Path,
        provider: Option<&str>,
        keep_original: bool,
    ) -> WatermarkResult {
        let provider_name = self.resolve_provider(provider);
        if provider_name == DISABLED {
            log::debug!("Watermark removal disabled, skipping {}", input.display());
            return WatermarkResult::not_enabled("watermark removal disabled");
        }

        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let Some(adapter) = self
            .providers
            .get(&provider_name)
            .filter(|p| p.is_available())
        else {
            log::warn!("Watermark provider '{}' is not available", provider_name);
            return WatermarkResult::failed(
                &provider_name,
                format!("provider unavailable: {provider_name}"),
                elapsed(),
            );
        };

        let file_name = match input.file_name() {
            Some(name) => name.to_owned(),
            None => {
                return WatermarkResult::failed(
                    &provider_name,
                    format!("not a file: {}", input.display()),
                    elapsed(),
                );
            }
        };
        let output = output_dir.join(file_name);

        log::debug!(
            "Removing watermark from {} via {} (keep original: {})",
            input.display(),
            provider_name,
            keep_original
        );

        match self.remove_with_retry(adapter.as_ref(), input, &output).await {
            Ok(()) => {
                if let Some(counter) = self.usage.get(&provider_name) {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                let duration_ms = elapsed();
                log::info!(
                    "Watermark removed: provider={}, file={}, {}ms",
                    provider_name,
                    input.display(),
                    duration_ms
                );
                WatermarkResult {
                    success: true,
                    result_file: Some(output),
                    error_message: None,
                    provider_used: provider_name,
                    duration_ms,
                }
            }
            Err(e) => {
                log::error!(
                    "Watermark removal failed: provider={}, file={}: {}",
                    provider_name,
                    input.display(),
                    e
                );
                WatermarkResult::failed(&provider_name, e.to_string(), elapsed())
            }
        }
    }

    async fn remove_with_retry(
        &self,
        provider: &dyn WatermarkProvider,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        let image = tokio::fs::read(input).await?;
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                _ = self.token.cancelled() => {
                    return Err(AppError::watermark(provider.name(), "interrupted"));
                }
                result = provider.remove(&image) => result,
            };

            match result {
                Ok(cleaned) => {
                    tokio::fs::write(output, cleaned).await?;
                    return Ok(());
                }
                Err(e) if attempt < self.max_retry => {
                    attempt += 1;
                    log::warn!(
                        "Watermark removal retry {}/{} for {}: {}",
                        attempt,
                        self.max_retry,
                        input.display(),
                        e
                    );
                    if !interruptible_sleep(&self.token, self.retry_delay).await {
                        return Err(AppError::watermark(provider.name(), "interrupted"));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Successful removals recorded for `provider`.
    pub fn usage_count(&self, provider: &str) -> usize {
        self.usage
            .get(provider)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn all_usage_counts(&self) -> BTreeMap<String, usize> {
        self.usage
            .iter()
            .map(|(name, c)| (name.clone(), c.load(Ordering::Relaxed)))
            .collect()
    }
}
