// src/services/extractor.rs

//! Image candidate extraction from a fetched page.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::services::heuristics::{is_candidate_image, upgrade_resolution};
use crate::utils::{is_http, origin, resolve_url};

/// Attributes that already reference the original upload, by priority.
const HIGH_RES_ATTRS: &[&str] = &[
    "data-rawurl",
    "data-raw",
    "data-highres",
    "data-original-url",
    "data-large",
    "data-hd",
];

/// Lazy-load attributes scanned independently of the main pass.
const LAZY_ATTRS: &[&str] = &["data-src", "data-original"];

/// Which extraction rule produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    HighResAttribute(&'static str),
    PrimarySource,
    LazyLoad(&'static str),
    BackgroundStyle,
}

/// A candidate image URL and the rule that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: String,
    pub source: CandidateSource,
}

/// Prioritized attribute/selector scan over a document.
pub struct PageExtractor {
    images: Selector,
    lazy_images: Selector,
    backgrounds: Selector,
    style_url: Regex,
}

impl PageExtractor {
    pub fn new() -> Result<Self> {
        let style_url = Regex::new(r#"url\(\s*([^)]*?)\s*\)"#)
            .map_err(|e| AppError::config(format!("background url pattern: {e}")))?;

        Ok(Self {
            images: parse_selector("img")?,
            lazy_images: parse_selector("img[data-src], img[data-original]")?,
            backgrounds: parse_selector("[style*='background-image']")?,
            style_url,
        })
    }

    /// Extract candidate image URLs, deduplicated by exact URL in first-seen order.
    pub fn extract(&self, document: &Html, page_url: &Url) -> Vec<ImageCandidate> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut push = |url: String, source: CandidateSource| {
            if seen.insert(url.clone()) {
                found.push(ImageCandidate { url, source });
            }
        };

        for img in document.select(&self.images) {
            if let Some(candidate) = self.from_image_element(&img, page_url) {
                push(candidate.url, candidate.source);
            }
        }

        for img in document.select(&self.lazy_images) {
            for attr in LAZY_ATTRS {
                if let Some(url) = attr_url(&img, attr, page_url).map(|u| upgrade_resolution(&u)) {
                    if is_candidate_image(&url) {
                        push(url, CandidateSource::LazyLoad(*attr));
                    }
                }
            }
        }

        let root = origin(page_url);
        for element in document.select(&self.backgrounds) {
            let Some(style) = element.value().attr("style") else {
                continue;
            };
            let Some(raw) = self.background_url(style) else {
                continue;
            };
            let resolved = resolve_url(&root, &raw);
            if !is_http(&resolved) {
                continue;
            }
            let url = upgrade_resolution(&resolved);
            if is_candidate_image(&url) {
                push(url, CandidateSource::BackgroundStyle);
            }
        }

        log::debug!("Extracted {} image candidates from {}", found.len(), page_url);
        found
    }

    // High-res attribute wins outright; otherwise fall back to an upgraded `src`.
    fn from_image_element(&self, img: &ElementRef<'_>, page_url: &Url) -> Option<ImageCandidate> {
        for attr in HIGH_RES_ATTRS {
            if let Some(url) = attr_url(img, attr, page_url) {
                if is_candidate_image(&url) {
                    return Some(ImageCandidate {
                        url,
                        source: CandidateSource::HighResAttribute(*attr),
                    });
                }
            }
        }

        let url = upgrade_resolution(&attr_url(img, "src", page_url)?);
        is_candidate_image(&url).then_some(ImageCandidate {
            url,
            source: CandidateSource::PrimarySource,
        })
    }

    fn background_url(&self, style: &str) -> Option<String> {
        let caps = self.style_url.captures(style)?;
        let inner = caps
            .get(1)?
            .as_str()
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        (!inner.is_empty()).then(|| inner.to_string())
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Resolve a non-empty attribute to an absolute HTTP(S) URL.
fn attr_url(element: &ElementRef<'_>, attr: &str, page_url: &Url) -> Option<String> {
    let value = element.value().attr(attr)?.trim();
    if value.is_empty() {
        return None;
    }
    let resolved = resolve_url(page_url, value);
    is_http(&resolved).then_some(resolved)
}
