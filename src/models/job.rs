//! Page and batch job descriptions.

use serde::{Deserialize, Serialize};

/// One unit of work: fetch a page (optionally its pagination chain) and
/// download its images. Immutable once handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageJob {
    pub source_url: String,

    /// Follow pagination links from the first page
    #[serde(default)]
    pub crawl_all_pages: bool,

    /// Page cap for crawls; falls back to `crawl.default_max_pages`
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Re-encode every image as JPEG
    #[serde(default = "default_true")]
    pub convert_to_jpeg: bool,

    #[serde(default)]
    pub watermark: WatermarkPolicy,

    #[serde(default)]
    pub output: OutputOptions,
}

fn default_true() -> bool {
    true
}

impl PageJob {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            crawl_all_pages: false,
            max_pages: None,
            convert_to_jpeg: true,
            watermark: WatermarkPolicy::default(),
            output: OutputOptions::default(),
        }
    }

    /// Follow pagination, fetching at most `max_pages` pages.
    pub fn crawl_all(mut self, max_pages: Option<usize>) -> Self {
        self.crawl_all_pages = true;
        self.max_pages = max_pages;
        self
    }

    /// Save images in their served format.
    pub fn keep_format(mut self) -> Self {
        self.convert_to_jpeg = false;
        self
    }

    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    /// Route every downloaded image through a watermark provider.
    pub fn remove_watermark(mut self, provider: Option<String>) -> Self {
        self.watermark.remove = true;
        self.watermark.provider = provider;
        self
    }
}

/// Where a job writes its images. Unset fields fall back to configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Exact output directory; wins over everything else
    #[serde(default)]
    pub save_path: Option<String>,

    /// Absolute, or relative to `download.base_path`
    #[serde(default)]
    pub target_dir: Option<String>,

    #[serde(default)]
    pub use_timestamp: Option<bool>,

    #[serde(default)]
    pub timestamp_format: Option<String>,
}

impl OutputOptions {
    pub fn target_dir(dir: impl Into<String>) -> Self {
        Self {
            target_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn without_timestamp(mut self) -> Self {
        self.use_timestamp = Some(false);
        self
    }
}

/// Per-job watermark removal settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatermarkPolicy {
    #[serde(default)]
    pub remove: bool,

    /// Provider override; the configured default is used when unset
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub save_original: Option<bool>,
}

/// A set of independent page jobs sharing one template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,

    #[serde(default)]
    pub crawl_all_pages: bool,

    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default = "default_true")]
    pub convert_to_jpeg: bool,

    #[serde(default)]
    pub watermark: WatermarkPolicy,

    #[serde(default)]
    pub output: OutputOptions,

    /// Run pages on a bounded worker pool instead of one by one
    #[serde(default = "default_true")]
    pub concurrent: bool,

    /// Worker pool size; falls back to `batch.max_concurrency`
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl BatchRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            crawl_all_pages: false,
            max_pages: None,
            convert_to_jpeg: true,
            watermark: WatermarkPolicy::default(),
            output: OutputOptions::default(),
            concurrent: true,
            max_concurrency: None,
        }
    }

    /// Expand into one job per URL, in submission order.
    pub fn into_jobs(self) -> Vec<PageJob> {
        self.urls
            .into_iter()
            .map(|url| PageJob {
                source_url: url,
                crawl_all_pages: self.crawl_all_pages,
                max_pages: self.max_pages,
                convert_to_jpeg: self.convert_to_jpeg,
                watermark: self.watermark.clone(),
                output: self.output.clone(),
            })
            .collect()
    }
}
