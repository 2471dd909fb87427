// src/utils/log.rs

//! Formatting helpers for multi-line log output.
//!
//! Everything goes through the `log` facade so the binary decides where it
//! ends up.

use crate::models::{BatchResult, PageResult};

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{border}");
    ::log::info!("  {title}");
    ::log::info!("{border}");
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    ::log::info!("    {message}");
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {title}");
    for (key, value) in items {
        ::log::info!("    {key}: {value}");
    }
}

/// Summarize one page job.
pub fn page_summary(result: &PageResult) {
    let mut items = vec![
        ("url", result.url.clone()),
        ("status", result.message.clone()),
        (
            "images",
            format!(
                "{} ok / {} failed / {} total",
                result.success_count, result.fail_count, result.total_count
            ),
        ),
        ("duration", format!("{} ms", result.duration_ms)),
    ];
    if let Some(path) = &result.save_path {
        items.push(("saved to", path.display().to_string()));
    }
    if !result.failure_summary.is_empty() {
        items.push(("failures", result.failure_summary_message()));
    }
    if let Some(stats) = &result.watermark_stats {
        items.push((
            "watermark",
            format!(
                "{} via {}: {} ok / {} failed, avg {} ms",
                if stats.enabled { "on" } else { "off" },
                stats.provider,
                stats.success_count,
                stats.fail_count,
                stats.avg_process_time_ms
            ),
        ));
    }
    summary("Page", &items);
}

/// Summarize a batch run.
pub fn batch_summary(result: &BatchResult) {
    summary(
        "Batch",
        &[
            (
                "pages",
                format!(
                    "{} ok / {} failed / {} total",
                    result.success_pages, result.fail_pages, result.total_pages
                ),
            ),
            (
                "images",
                format!(
                    "{} ok / {} failed / {} total",
                    result.success_images, result.fail_images, result.total_images
                ),
            ),
            ("duration", format!("{} ms", result.total_duration_ms)),
        ],
    );
    for page in result.page_results.iter().filter(|p| !p.success) {
        sub_item(&format!("failed: {} ({})", page.url, page.message));
    }
}
