//! Service layer for the harvester.
//!
//! This module contains the building blocks the pipeline drives:
//! - URL heuristics (`heuristics`)
//! - Candidate image extraction (`PageExtractor`)
//! - Pagination discovery (`PaginationDiscoverer`)
//! - Single-image downloads with retry (`ImageDownloader`)
//! - Remote watermark removal (`WatermarkService`)

pub mod convert;
mod downloader;
mod extractor;
pub mod heuristics;
mod pagination;
pub mod retry;
pub mod watermark;

pub use downloader::{ImageDownloader, SaveOptions};
pub use extractor::{CandidateSource, ImageCandidate, PageExtractor};
pub use pagination::PaginationDiscoverer;
pub use retry::RetryPolicy;
pub use watermark::{WatermarkProvider, WatermarkResult, WatermarkService};
