//! Pipeline entry points for harvesting runs.
//!
//! - `Harvester::run_page`: crawl one page job and download its images
//! - `Harvester::run_batch`: run many page jobs, sequentially or concurrently

mod batch;
pub mod crawl;
pub mod output;
mod page;

pub use crawl::{CrawlDriver, CrawlState, FoundImage};
pub use output::{OutputLayout, prepare_output, resolve_output};

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{BatchRequest, BatchResult, Config};
use crate::services::{ImageDownloader, PageExtractor, PaginationDiscoverer, WatermarkService};
use crate::utils::http;

/// Owns every collaborator a run needs. Cheap to clone.
#[derive(Clone)]
pub struct Harvester {
    config: Arc<Config>,
    page_client: Client,
    downloader: ImageDownloader,
    extractor: Arc<PageExtractor>,
    discoverer: Arc<PaginationDiscoverer>,
    watermark: Arc<WatermarkService>,
    token: CancellationToken,
}

impl Harvester {
    /// Build HTTP clients and services from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let token = CancellationToken::new();
        let watermark = WatermarkService::from_config(&config.watermark, token.clone())?;
        Self::with_watermark_service(config, watermark, token)
    }

    /// Use a prepared watermark registry; `token` must be the one it was built with.
    pub fn with_watermark_service(
        config: Config,
        watermark: WatermarkService,
        token: CancellationToken,
    ) -> Result<Self> {
        let page_client = http::create_page_client(&config)?;
        let image_client = http::create_image_client(&config)?;
        let downloader = ImageDownloader::new(image_client, &config.download, token.clone());

        Ok(Self {
            extractor: Arc::new(PageExtractor::new()?),
            discoverer: Arc::new(PaginationDiscoverer::new(config.crawl.page_size)?),
            config: Arc::new(config),
            page_client,
            downloader,
            watermark: Arc::new(watermark),
            token,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling this token interrupts every running download and crawl.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn watermark_service(&self) -> &WatermarkService {
        &self.watermark
    }

    /// Expand a batch request and run it.
    pub async fn run_request(&self, request: BatchRequest) -> BatchResult {
        let concurrent = request.concurrent;
        let max_concurrency = request
            .max_concurrency
            .unwrap_or(self.config.batch.max_concurrency);
        self.run_batch(request.into_jobs(), concurrent, max_concurrency)
            .await
    }
}
