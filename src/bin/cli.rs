//! Harvester CLI
//!
//! Local execution entry point: harvest one page or a batch of pages and
//! print the result tree as JSON.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use harvester::{
    Harvester,
    error::Result,
    models::{BatchRequest, Config, OutputOptions, PageJob, WatermarkPolicy},
    storage::LocalStorage,
};
use serde::Serialize;

/// Harvester - Gallery Image Downloader
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Extracts and downloads full-resolution images from gallery pages"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the images of one page (and optionally its pagination chain)
    Page {
        url: String,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Download several pages
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Process pages one at a time, in order
        #[arg(long)]
        sequential: bool,

        /// Worker pool size (default: batch.max_concurrency)
        #[arg(long)]
        max_concurrency: Option<usize>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Validate configuration file
    Validate,
}

/// Options shared by `page` and `batch`.
#[derive(Args, Debug)]
struct JobArgs {
    /// Follow pagination links
    #[arg(long)]
    all_pages: bool,

    /// Page cap when following pagination (default: crawl.default_max_pages)
    #[arg(long)]
    max_pages: Option<usize>,

    /// Save images in their served format instead of JPEG
    #[arg(long)]
    keep_format: bool,

    /// Output directory, absolute or relative to download.base_path
    #[arg(long)]
    target_dir: Option<String>,

    /// Exact output directory
    #[arg(long)]
    save_path: Option<String>,

    /// Do not add a timestamp directory
    #[arg(long)]
    no_timestamp: bool,

    /// strftime format of the timestamp directory
    #[arg(long)]
    timestamp_format: Option<String>,

    /// Send every image through a watermark removal provider
    #[arg(long)]
    remove_watermark: bool,

    /// Watermark provider (default: watermark.default_provider)
    #[arg(long)]
    provider: Option<String>,

    /// Also write the JSON result to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl JobArgs {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            save_path: self.save_path.clone(),
            target_dir: self.target_dir.clone(),
            use_timestamp: self.no_timestamp.then_some(false),
            timestamp_format: self.timestamp_format.clone(),
        }
    }

    fn watermark(&self) -> WatermarkPolicy {
        WatermarkPolicy {
            remove: self.remove_watermark,
            provider: self.provider.clone(),
            save_original: None,
        }
    }

    fn page_job(&self, url: String) -> PageJob {
        PageJob {
            source_url: url,
            crawl_all_pages: self.all_pages,
            max_pages: self.max_pages,
            convert_to_jpeg: !self.keep_format,
            watermark: self.watermark(),
            output: self.output(),
        }
    }
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Print a result as JSON and optionally persist it.
async fn emit<T: Serialize>(result: &T, report: Option<&PathBuf>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);

    if let Some(path) = report {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.json".to_string());
        let written = LocalStorage::new(dir).write_json(&name, result).await?;
        log::info!("Report written to {}", written.display());
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK");
        return Ok(());
    }

    config.validate()?;
    let harvester = Harvester::new(config)?;

    let token = harvester.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping...");
            token.cancel();
        }
    });

    let success = match cli.command {
        Command::Page { url, job } => {
            let result = harvester.run_page(&job.page_job(url)).await;
            emit(&result, job.report.as_ref()).await?;
            result.success
        }

        Command::Batch {
            urls,
            sequential,
            max_concurrency,
            job,
        } => {
            let request = BatchRequest {
                urls,
                crawl_all_pages: job.all_pages,
                max_pages: job.max_pages,
                convert_to_jpeg: !job.keep_format,
                watermark: job.watermark(),
                output: job.output(),
                concurrent: !sequential,
                max_concurrency,
            };
            let result = harvester.run_request(request).await;
            emit(&result, job.report.as_ref()).await?;
            result.success
        }

        Command::Validate => true,
    };

    for (provider, count) in harvester.watermark_service().all_usage_counts() {
        if count > 0 {
            log::info!("Watermark provider {}: {} images cleaned", provider, count);
        }
    }

    if !success {
        std::process::exit(1);
    }
    log::info!("Done!");

    Ok(())
}
