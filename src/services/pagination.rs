// src/services/pagination.rs

//! Pagination discovery for gallery pages.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::{is_http, resolve_url};

/// Selectors known to match pagination links.
const LINK_SELECTORS: &[&str] = &["div.paginator a", ".page-link"];

/// Containers searched first for the total count marker.
const COUNTER_SELECTOR: &str = "div.paginator, div.pagination";

/// Finds follow-up page URLs from the first page of a crawl.
pub struct PaginationDiscoverer {
    links: Vec<Selector>,
    counters: Selector,
    body: Selector,
    total_marker: Regex,
    page_size: usize,
}

impl PaginationDiscoverer {
    pub fn new(page_size: usize) -> Result<Self> {
        let links = LINK_SELECTORS
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>>>()?;
        let total_marker = Regex::new(r"共\s*(\d+)")
            .map_err(|e| AppError::config(format!("total marker pattern: {e}")))?;

        Ok(Self {
            links,
            counters: parse_selector(COUNTER_SELECTOR)?,
            body: parse_selector("body")?,
            total_marker,
            page_size: page_size.max(1),
        })
    }

    /// Ordered candidate page URLs after `base_url`, at most `limit` of them.
    ///
    /// Falls back to synthetic `start=` offsets when no pagination markup
    /// matches. Never fetches anything.
    pub fn discover(&self, document: &Html, base_url: &Url, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let mut linked = self.linked_pages(document, base_url);
        linked.truncate(limit);
        if !linked.is_empty() {
            log::debug!("Found {} pagination links on {}", linked.len(), base_url);
            return linked;
        }

        let generated = self.synthetic_pages(document, base_url.as_str(), limit);
        if !generated.is_empty() {
            log::debug!(
                "Generated {} synthetic page URLs for {}",
                generated.len(),
                base_url
            );
        }
        generated
    }

    fn linked_pages(&self, document: &Html, base_url: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut pages = Vec::new();

        for selector in &self.links {
            for link in document.select(selector) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let href = href.trim();
                if href.is_empty() {
                    continue;
                }
                let absolute = resolve_url(base_url, href);
                if absolute == base_url.as_str() || !is_http(&absolute) {
                    continue;
                }
                if seen.insert(absolute.clone()) {
                    pages.push(absolute);
                }
            }
        }
        pages
    }

    // The marker is page text, so the page count it implies is untrusted.
    fn synthetic_pages(&self, document: &Html, base_url: &str, limit: usize) -> Vec<String> {
        let Some(total) = self.total_count(document) else {
            return Vec::new();
        };

        let page_count = total.div_ceil(self.page_size);
        let separator = if base_url.contains('?') { '&' } else { '?' };
        (1..page_count)
            .take(limit)
            .map_while(|i| i.checked_mul(self.page_size))
            .map(|offset| format!("{base_url}{separator}start={offset}"))
            .collect()
    }

    fn total_count(&self, document: &Html) -> Option<usize> {
        let scoped = document
            .select(&self.counters)
            .map(|el| el.text().collect::<String>())
            .find_map(|text| self.parse_total(&text));

        scoped.or_else(|| {
            document
                .select(&self.body)
                .map(|el| el.text().collect::<String>())
                .find_map(|text| self.parse_total(&text))
        })
    }

    fn parse_total(&self, text: &str) -> Option<usize> {
        self.total_marker
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discover(html: &str, base: &str) -> Vec<String> {
        discover_at_most(html, base, 50)
    }

    fn discover_at_most(html: &str, base: &str, limit: usize) -> Vec<String> {
        let discoverer = PaginationDiscoverer::new(30).unwrap();
        discoverer.discover(&Html::parse_document(html), &Url::parse(base).unwrap(), limit)
    }

    #[test]
    fn test_synthetic_pages_from_total_marker() {
        let pages = discover(
            r#"<html><body><span class="count">(共243张)</span></body></html>"#,
            "https://movie.example.com/subject/1/photos?type=S",
        );
        assert_eq!(pages.len(), 8);
        for (i, page) in pages.iter().enumerate() {
            let offset = (i + 1) * 30;
            assert_eq!(
                page,
                &format!("https://movie.example.com/subject/1/photos?type=S&start={offset}")
            );
        }
    }

    #[test]
    fn test_synthetic_pages_use_question_mark_without_query() {
        let pages = discover(
            r#"<div class="pagination">共 61 张</div>"#,
            "https://a.example/album",
        );
        assert_eq!(
            pages,
            vec![
                "https://a.example/album?start=30",
                "https://a.example/album?start=60",
            ]
        );
    }

    #[test]
    fn test_links_are_absolute_deduped_and_filtered() {
        let pages = discover(
            r#"<div class="paginator">
                 <a href="?start=30">2</a>
                 <a href="https://a.example/album?start=60">3</a>
                 <a href="?start=30">2</a>
                 <a href="https://a.example/album">1</a>
                 <a href="javascript:void(0)">next</a>
               </div>
               <a class="page-link" href="/album?start=90">4</a>"#,
            "https://a.example/album",
        );
        assert_eq!(
            pages,
            vec![
                "https://a.example/album?start=30",
                "https://a.example/album?start=60",
                "https://a.example/album?start=90",
            ]
        );
    }

    #[test]
    fn test_huge_total_is_capped() {
        let pages = discover_at_most("<p>共300000000张</p>", "https://a.example/album", 5);
        assert_eq!(pages.len(), 5);
        assert_eq!(pages[4], "https://a.example/album?start=150");

        let pages = discover_at_most(
            &format!("<p>共{}张</p>", usize::MAX),
            "https://a.example/album",
            3,
        );
        assert_eq!(pages.len(), 3);
    }

    #[test]
    fn test_links_respect_limit() {
        let pages = discover_at_most(
            r#"<div class="paginator"><a href="?start=30">2</a><a href="?start=60">3</a></div>"#,
            "https://a.example/album",
            1,
        );
        assert_eq!(pages, vec!["https://a.example/album?start=30"]);
        assert!(discover_at_most("<p>共90张</p>", "https://a.example/album", 0).is_empty());
    }

    #[test]
    fn test_nothing_found() {
        assert!(discover("<p>single page</p>", "https://a.example/x").is_empty());
    }
}
