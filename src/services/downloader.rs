// src/services/downloader.rs

//! Single-image downloader.
//!
//! Each hop runs `connect → classify → convert/save` inside a retry loop.
//! 301/302/303 responses end the hop and restart it at the `Location`
//! target with a fresh attempt budget, up to `download.max_redirects` hops.

use std::path::PathBuf;
use std::time::Instant;

use futures::StreamExt;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERER, RETRY_AFTER,
};
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;
use crate::models::{DownloadConfig, DownloadOutcome, FailureReason};
use crate::services::convert;
use crate::services::retry::{RetryPolicy, parse_retry_after};
use crate::storage::LocalStorage;
use crate::utils::interruptible_sleep;
use crate::utils::url::{filename_from_url, with_jpeg_extension};

/// Where a downloaded image goes and how it is stored.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions<'a> {
    pub storage: &'a LocalStorage,
    pub convert_to_jpeg: bool,
}

/// What one successful hop produced.
enum Hop {
    Saved(PathBuf),
    Redirect(String),
}

/// A failed hop and how many attempts it consumed.
struct HopFailure {
    error: DownloadError,
    attempts: u32,
}

/// Downloads individual images with retry, redirect and rate-limit handling.
#[derive(Clone)]
pub struct ImageDownloader {
    client: Client,
    policy: RetryPolicy,
    accept: String,
    accept_language: String,
    max_redirects: u32,
    token: CancellationToken,
}

impl ImageDownloader {
    /// `client` should have transport redirects disabled
    /// (see [`create_image_client`](crate::utils::http::create_image_client)).
    pub fn new(client: Client, config: &DownloadConfig, token: CancellationToken) -> Self {
        Self {
            client,
            policy: RetryPolicy::from_config(config),
            accept: config.accept.clone(),
            accept_language: config.accept_language.clone(),
            max_redirects: config.max_redirects,
            token,
        }
    }

    /// Download one image. Never fails; the outcome carries the reason.
    pub async fn download(&self, url: &str, referer: &str, save: SaveOptions<'_>) -> DownloadOutcome {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        // Requests across the whole redirect chain.
        let mut attempts = 0;
        let mut current = url.to_string();
        for hop in 0..=self.max_redirects {
            match self.run_hop(&current, referer, save).await {
                Ok((Hop::Saved(path), used)) => {
                    log::debug!("Saved {} -> {}", url, path.display());
                    return DownloadOutcome::saved(url, path, attempts + used, elapsed());
                }
                Ok((Hop::Redirect(next), used)) => {
                    attempts += used;
                    log::debug!("Redirect {}/{}: {} -> {}", hop + 1, self.max_redirects, current, next);
                    current = next;
                }
                Err(failure) => {
                    log::warn!("Giving up on {}: {}", url, failure.error);
                    let reason = FailureReason::from(&failure.error);
                    return DownloadOutcome::failed(url, reason, attempts + failure.attempts, elapsed());
                }
            }
        }

        let error = DownloadError::RedirectLimit {
            url: url.to_string(),
        };
        log::warn!("{error}");
        DownloadOutcome::failed(url, FailureReason::from(&error), attempts, elapsed())
    }

    /// Retry loop for one URL of the redirect chain.
    async fn run_hop(
        &self,
        url: &str,
        referer: &str,
        save: SaveOptions<'_>,
    ) -> Result<(Hop, u32), HopFailure> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.attempt(url, referer, save).await {
                Ok(hop) => return Ok((hop, attempt)),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(HopFailure {
                    error,
                    attempts: attempt,
                });
            }
            log::warn!(
                "Attempt {}/{} failed for {}: {}",
                attempt,
                max_attempts,
                url,
                error
            );

            if matches!(error, DownloadError::RateLimited { .. }) {
                let wait = self.policy.rate_limit_wait(error.retry_after(), attempt);
                log::warn!("Rate limited by {}, waiting {:?}", url, wait);
                self.pause(url, wait, attempt).await?;
            }
            self.pause(url, self.policy.backoff(attempt), attempt).await?;

            if !self.policy.should_retry(&error, attempt) {
                return Err(HopFailure {
                    error,
                    attempts: attempt,
                });
            }
        }
    }

    async fn pause(&self, url: &str, wait: std::time::Duration, attempt: u32) -> Result<(), HopFailure> {
        if interruptible_sleep(&self.token, wait).await {
            Ok(())
        } else {
            Err(HopFailure {
                error: DownloadError::Interrupted {
                    url: url.to_string(),
                },
                attempts: attempt,
            })
        }
    }

    /// One request: classify the response, then save or report a redirect.
    async fn attempt(&self, url: &str, referer: &str, save: SaveOptions<'_>) -> Result<Hop, DownloadError> {
        let request = self
            .client
            .get(url)
            .header(REFERER, referer)
            .header(ACCEPT, &self.accept)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .header(CACHE_CONTROL, "no-cache");

        let response = tokio::select! {
            _ = self.token.cancelled() => {
                return Err(DownloadError::Interrupted { url: url.to_string() });
            }
            sent = request.send() => sent.map_err(|e| DownloadError::from_reqwest(url, &e))?,
        };

        let status = response.status().as_u16();
        match status {
            200 => {}
            301 | 302 | 303 => return redirect_target(url, &response).map(Hop::Redirect),
            429 => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                return Err(DownloadError::RateLimited {
                    url: url.to_string(),
                    retry_after,
                });
            }
            _ => {
                return Err(DownloadError::Status {
                    url: url.to_string(),
                    status,
                });
            }
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !content_type.starts_with("image/") {
                log::warn!("{} answered with Content-Type {}", url, content_type);
            }
        }

        let name = filename_from_url(url);
        if save.convert_to_jpeg {
            let body = self.read_body(url, response).await?;
            let jpeg = convert::to_jpeg(body)
                .await
                .map_err(|e| DownloadError::InvalidImage {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            let jpeg_name = with_jpeg_extension(&name);
            let path = save
                .storage
                .write_new(&jpeg_name, &jpeg)
                .await
                .map_err(|source| DownloadError::Io {
                    path: save.storage.root().join(&jpeg_name),
                    source,
                })?;
            Ok(Hop::Saved(path))
        } else {
            self.stream_to_storage(url, &name, response, save.storage)
                .await
                .map(Hop::Saved)
        }
    }

    async fn read_body(&self, url: &str, response: Response) -> Result<Vec<u8>, DownloadError> {
        tokio::select! {
            _ = self.token.cancelled() => Err(DownloadError::Interrupted { url: url.to_string() }),
            body = response.bytes() => body
                .map(|b| b.to_vec())
                .map_err(|e| DownloadError::from_reqwest(url, &e)),
        }
    }

    /// Stream the body verbatim into a freshly reserved file.
    async fn stream_to_storage(
        &self,
        url: &str,
        name: &str,
        response: Response,
        storage: &LocalStorage,
    ) -> Result<PathBuf, DownloadError> {
        let io_error = |source| DownloadError::Io {
            path: storage.root().join(name),
            source,
        };

        let mut pending = storage.begin(name).await.map_err(io_error)?;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                _ = self.token.cancelled() => {
                    pending.abort().await;
                    return Err(DownloadError::Interrupted { url: url.to_string() });
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if let Err(e) = pending.write_chunk(&chunk).await {
                        pending.abort().await;
                        return Err(io_error(e));
                    }
                }
                Some(Err(e)) => {
                    pending.abort().await;
                    return Err(DownloadError::from_reqwest(url, &e));
                }
                None => break,
            }
        }

        pending.commit().await.map_err(io_error)
    }
}

fn redirect_target(url: &str, response: &Response) -> Result<String, DownloadError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })?;

    crate::utils::resolve(url, location).ok_or_else(|| DownloadError::Other {
        url: url.to_string(),
        message: format!("unresolvable redirect target '{location}'"),
    })
}
