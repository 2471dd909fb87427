// src/models/mod.rs

//! Domain models for the harvester.
//!
//! Configuration, job descriptions, and the result tree produced by the
//! orchestrator.

mod config;
mod job;
mod outcome;

// Re-export all public types
pub use config::{
    BaiduConfig, BatchConfig, Config, CrawlConfig, DownloadConfig, KNOWN_PROVIDERS,
    LoggingConfig, OutputConfig, TencentConfig, WatermarkConfig,
};
pub use job::{BatchRequest, OutputOptions, PageJob, WatermarkPolicy};
pub use outcome::{BatchResult, DownloadOutcome, FailureReason, PageResult, WatermarkStats};
