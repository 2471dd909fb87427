// src/pipeline/crawl.rs

//! Crawl driver: fetches a seed page and, optionally, its pagination chain,
//! collecting candidate image URLs.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::services::{ImageCandidate, PageExtractor, PaginationDiscoverer};
use crate::utils::http::fetch_page_text;
use crate::utils::interruptible_sleep;

/// An image found during a crawl, with the page it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundImage {
    pub url: String,
    pub page_url: String,
}

/// Per-crawl bookkeeping, owned by one driver invocation.
#[derive(Debug, Default)]
pub struct CrawlState {
    visited: HashSet<String>,
    seen_images: HashSet<String>,
    images: Vec<FoundImage>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a page as fetched. Returns `false` if it already was.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    /// Add candidates not seen earlier in this crawl. Returns how many were new.
    pub fn add_images(&mut self, page_url: &str, candidates: Vec<ImageCandidate>) -> usize {
        let before = self.images.len();
        for candidate in candidates {
            if self.seen_images.insert(candidate.url.clone()) {
                self.images.push(FoundImage {
                    url: candidate.url,
                    page_url: page_url.to_string(),
                });
            }
        }
        self.images.len() - before
    }

    pub fn into_images(self) -> Vec<FoundImage> {
        self.images
    }
}

/// Fetches pages and feeds them through extraction and pagination discovery.
pub struct CrawlDriver<'a> {
    pub client: &'a Client,
    pub extractor: &'a PageExtractor,
    pub discoverer: &'a PaginationDiscoverer,
    pub page_delay: Duration,
    pub token: &'a CancellationToken,
}

impl CrawlDriver<'_> {
    /// Collect images from `seed`, following pagination when `max_pages > 1`.
    ///
    /// Fails only when the seed page itself cannot be fetched. Later pages
    /// that fail are logged and skipped, but still count toward `max_pages`.
    pub async fn collect(&self, seed: &Url, follow: bool, max_pages: usize) -> Result<Vec<FoundImage>> {
        let mut state = CrawlState::new();
        let seed_url = seed.to_string();

        state.mark_visited(&seed_url);
        let html = self.fetch(&seed_url).await?;
        let link_limit = if follow { max_pages.saturating_sub(1) } else { 0 };
        let (candidates, links) = self.parse(&html, seed, link_limit);
        let added = state.add_images(&seed_url, candidates);
        log::info!("Page 1: {} images at {}", added, seed_url);

        if !follow {
            return Ok(state.into_images());
        }
        log::info!("Discovered {} pagination links", links.len());

        for link in links {
            if state.pages_visited() >= max_pages {
                log::info!("Reached page limit ({max_pages})");
                break;
            }
            if state.is_visited(&link) {
                continue;
            }
            if !interruptible_sleep(self.token, self.page_delay).await {
                log::warn!("Crawl interrupted after {} pages", state.pages_visited());
                break;
            }

            state.mark_visited(&link);
            let page_no = state.pages_visited();
            let html = match self.fetch(&link).await {
                Ok(html) => html,
                Err(e) => {
                    log::warn!("Skipping page {}: {}", page_no, e);
                    continue;
                }
            };
            let Ok(page_url) = Url::parse(&link) else {
                continue;
            };
            let (candidates, _) = self.parse(&html, &page_url, 0);
            let added = state.add_images(&link, candidates);
            log::info!("Page {}: {} new images at {}", page_no, added, link);
        }

        log::info!(
            "Crawl finished: {} pages, {} images",
            state.pages_visited(),
            state.images.len()
        );
        Ok(state.into_images())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        tokio::select! {
            _ = self.token.cancelled() => Err(AppError::crawl(url, "interrupted")),
            text = fetch_page_text(self.client, url) => text,
        }
    }

    // Html is !Send, so it never lives across an await.
    fn parse(&self, html: &str, page_url: &Url, link_limit: usize) -> (Vec<ImageCandidate>, Vec<String>) {
        let document = Html::parse_document(html);
        let candidates = self.extractor.extract(&document, page_url);
        let links = self.discoverer.discover(&document, page_url, link_limit);
        (candidates, links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::CandidateSource;

    fn candidate(url: &str) -> ImageCandidate {
        ImageCandidate {
            url: url.to_string(),
            source: CandidateSource::PrimarySource,
        }
    }

    #[test]
    fn test_visited_pages_are_tracked_once() {
        let mut state = CrawlState::new();
        assert!(state.mark_visited("https://a.example/1"));
        assert!(!state.mark_visited("https://a.example/1"));
        assert!(state.is_visited("https://a.example/1"));
        assert_eq!(state.pages_visited(), 1);
    }

    #[test]
    fn test_images_deduplicated_across_pages() {
        let mut state = CrawlState::new();
        let first = state.add_images(
            "https://a.example/1",
            vec![candidate("https://img/a.jpg"), candidate("https://img/b.jpg")],
        );
        let second = state.add_images(
            "https://a.example/2",
            vec![candidate("https://img/b.jpg"), candidate("https://img/c.jpg")],
        );
        assert_eq!((first, second), (2, 1));

        let images = state.into_images();
        let urls: Vec<_> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://img/a.jpg", "https://img/b.jpg", "https://img/c.jpg"]);
        assert_eq!(images[2].page_url, "https://a.example/2");
    }
}
