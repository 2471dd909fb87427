// src/pipeline/page.rs

//! Single page job: crawl, download every image, optionally clean watermarks.

use std::path::Path;
use std::time::Instant;

use url::Url;

use crate::models::{DownloadOutcome, FailureReason, PageJob, PageResult, WatermarkStats};
use crate::pipeline::Harvester;
use crate::pipeline::crawl::{CrawlDriver, FoundImage};
use crate::pipeline::output::{prepare_output, resolve_output};
use crate::services::SaveOptions;
use crate::services::watermark::DISABLED;
use crate::utils::{interruptible_sleep, is_http, log as summary};

impl Harvester {
    /// Run one page job. Never fails; problems are reported in the result.
    pub async fn run_page(&self, job: &PageJob) -> PageResult {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;
        let url = job.source_url.trim();

        summary::header(&format!("Harvesting {url}"));

        let seed = match Url::parse(url) {
            Ok(seed) if is_http(url) => seed,
            _ => {
                log::error!("Not an http(s) URL: {}", url);
                return PageResult::failed(url, format!("invalid page URL: {url}"), elapsed());
            }
        };

        let max_pages = if job.crawl_all_pages {
            job.max_pages
                .unwrap_or(self.config.crawl.default_max_pages)
                .max(1)
        } else {
            1
        };
        let driver = CrawlDriver {
            client: &self.page_client,
            extractor: &self.extractor,
            discoverer: &self.discoverer,
            page_delay: self.config.crawl.page_delay(),
            token: &self.token,
        };
        let images = match driver.collect(&seed, job.crawl_all_pages, max_pages).await {
            Ok(images) => images,
            Err(e) => {
                log::error!("Failed to fetch {}: {}", url, e);
                let result = PageResult::failed(url, format!("failed to fetch page: {e}"), elapsed());
                summary::page_summary(&result);
                return result;
            }
        };

        if images.is_empty() && !job.crawl_all_pages {
            log::warn!("No images found on {}", url);
            let result = PageResult::failed(url, "no images found on page", elapsed());
            summary::page_summary(&result);
            return result;
        }

        let layout = resolve_output(&self.config, job, job.watermark.remove);
        if let Err(e) = prepare_output(&layout).await {
            log::error!("{}", e);
            let result = PageResult::failed(url, e.to_string(), elapsed());
            summary::page_summary(&result);
            return result;
        }
        log::info!("Saving {} images to {}", images.len(), layout.base.display());

        let mut stats = job.watermark.remove.then(|| {
            let provider = self
                .watermark
                .resolve_provider(job.watermark.provider.as_deref());
            let enabled = provider != DISABLED;
            WatermarkStats::new(provider, enabled)
        });

        let storage = layout.storage();
        let save = SaveOptions {
            storage: &storage,
            convert_to_jpeg: job.convert_to_jpeg,
        };

        let mut outcomes = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            if index > 0
                && !interruptible_sleep(&self.token, self.config.download.request_interval()).await
            {
                outcomes.push(interrupted(image));
                continue;
            }
            if self.token.is_cancelled() {
                outcomes.push(interrupted(image));
                continue;
            }

            log::info!("[{}/{}] {}", index + 1, images.len(), image.url);
            let outcome = self.downloader.download(&image.url, &image.page_url, save).await;

            if let (Some(stats), Some(saved), Some(cleaned)) =
                (stats.as_mut(), outcome.saved_path.as_deref(), layout.cleaned.as_deref())
            {
                self.clean_watermark(job, saved, cleaned, stats).await;
            }
            outcomes.push(outcome);
        }

        let mut result = PageResult::from_outcomes(url, layout.base, outcomes, elapsed());
        if self.token.is_cancelled() {
            result.message = format!("{} (interrupted)", result.message);
        }
        result.watermark_stats = stats;
        summary::page_summary(&result);
        result
    }

    async fn clean_watermark(
        &self,
        job: &PageJob,
        saved: &Path,
        cleaned_dir: &Path,
        stats: &mut WatermarkStats,
    ) {
        let keep_original = job
            .watermark
            .save_original
            .unwrap_or(self.config.watermark.save_original);
        let result = self
            .watermark
            .remove_watermark(saved, cleaned_dir, job.watermark.provider.as_deref(), keep_original)
            .await;
        if result.was_attempted() {
            stats.record(result.success, result.duration_ms, result.error_message.as_deref());
        }
    }
}

fn interrupted(image: &FoundImage) -> DownloadOutcome {
    DownloadOutcome::failed(&image.url, FailureReason::Interrupted, 0, 0)
}
