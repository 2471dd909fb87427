// src/pipeline/batch.rs

//! Batch orchestration over independent page jobs.
//!
//! Concurrent batches run each page on its own task, gated by a semaphore.
//! Results are always reported in submission order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::models::{BatchResult, PageJob, PageResult};
use crate::pipeline::Harvester;
use crate::utils::{interruptible_sleep, log as summary};

/// Running totals, safe to update from concurrent page tasks.
#[derive(Debug, Default)]
pub struct BatchCounters {
    success_pages: AtomicUsize,
    fail_pages: AtomicUsize,
    total_images: AtomicUsize,
    success_images: AtomicUsize,
    fail_images: AtomicUsize,
}

impl BatchCounters {
    pub fn record(&self, page: &PageResult) {
        if page.success {
            self.success_pages.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fail_pages.fetch_add(1, Ordering::Relaxed);
        }
        self.total_images.fetch_add(page.total_count, Ordering::Relaxed);
        self.success_images.fetch_add(page.success_count, Ordering::Relaxed);
        self.fail_images.fetch_add(page.fail_count, Ordering::Relaxed);
    }

    fn to_result(&self, page_results: Vec<PageResult>, total_duration_ms: u64) -> BatchResult {
        let success_pages = self.success_pages.load(Ordering::Relaxed);
        let fail_pages = self.fail_pages.load(Ordering::Relaxed);
        let total_pages = success_pages + fail_pages;
        let success_images = self.success_images.load(Ordering::Relaxed);
        let total_images = self.total_images.load(Ordering::Relaxed);

        let message = format!(
            "{success_pages}/{total_pages} pages succeeded, {success_images}/{total_images} images downloaded"
        );
        BatchResult {
            success: fail_pages == 0,
            message,
            total_pages,
            success_pages,
            fail_pages,
            total_images,
            success_images,
            fail_images: self.fail_images.load(Ordering::Relaxed),
            total_duration_ms,
            page_results,
        }
    }
}

impl Harvester {
    /// Run page jobs one by one, or on a pool of `max_concurrency` workers.
    ///
    /// Page failures become failed `PageResult`s; the batch itself never fails.
    pub async fn run_batch(
        &self,
        jobs: Vec<PageJob>,
        concurrent: bool,
        max_concurrency: usize,
    ) -> BatchResult {
        let started = Instant::now();
        summary::header(&format!(
            "Batch of {} pages ({})",
            jobs.len(),
            if concurrent { "concurrent" } else { "sequential" }
        ));

        let counters = Arc::new(BatchCounters::default());
        let page_results = if concurrent && jobs.len() > 1 {
            self.run_concurrent(jobs, max_concurrency.max(1), &counters)
                .await
        } else {
            self.run_sequential(jobs, &counters).await
        };

        let result = counters.to_result(page_results, started.elapsed().as_millis() as u64);
        summary::batch_summary(&result);
        result
    }

    async fn run_sequential(&self, jobs: Vec<PageJob>, counters: &BatchCounters) -> Vec<PageResult> {
        // Pages are spaced further apart than images.
        let page_gap = self.config.download.request_interval() * 2;
        let mut results = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.iter().enumerate() {
            if index > 0 && !interruptible_sleep(&self.token, page_gap).await {
                log::warn!("Batch interrupted before page {}", index + 1);
            }
            let result = self.run_page(job).await;
            counters.record(&result);
            results.push(result);
        }
        results
    }

    async fn run_concurrent(
        &self,
        jobs: Vec<PageJob>,
        max_concurrency: usize,
        counters: &Arc<BatchCounters>,
    ) -> Vec<PageResult> {
        log::info!("Running {} pages with {} workers", jobs.len(), max_concurrency);
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let mut handles = Vec::with_capacity(jobs.len());
        let mut urls = Vec::with_capacity(jobs.len());

        for job in jobs {
            urls.push(job.source_url.clone());
            let harvester = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let counters = Arc::clone(counters);

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let result = PageResult::failed(&job.source_url, "worker pool closed", 0);
                    counters.record(&result);
                    return result;
                };
                let result = harvester.run_page(&job).await;
                counters.record(&result);
                result
            }));
        }

        let finished = CancellationToken::new();
        let watchdog = tokio::spawn(shutdown_watchdog(
            self.token.clone(),
            finished.clone(),
            Duration::from_secs(self.config.batch.shutdown_grace_secs),
            handles.iter().map(|h| h.abort_handle()).collect(),
        ));

        let mut results = Vec::with_capacity(handles.len());
        for (handle, url) in handles.into_iter().zip(urls) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let result = PageResult::failed(url, join_failure(&e), 0);
                    counters.record(&result);
                    result
                }
            };
            results.push(result);
        }

        finished.cancel();
        if let Err(e) = watchdog.await {
            log::debug!("Shutdown watchdog ended abnormally: {}", e);
        }
        results
    }
}

/// After cancellation, give page tasks `grace` to wind down, then abort them.
async fn shutdown_watchdog(
    token: CancellationToken,
    finished: CancellationToken,
    grace: Duration,
    tasks: Vec<tokio::task::AbortHandle>,
) {
    tokio::select! {
        _ = finished.cancelled() => return,
        _ = token.cancelled() => {}
    }
    log::warn!("Cancellation requested, waiting up to {:?} for pages to stop", grace);

    tokio::select! {
        _ = finished.cancelled() => {}
        _ = tokio::time::sleep(grace) => {
            let running = tasks.iter().filter(|t| !t.is_finished()).count();
            log::warn!("Grace period elapsed, aborting {} page tasks", running);
            for task in &tasks {
                task.abort();
            }
        }
    }
}

fn join_failure(err: &JoinError) -> String {
    if err.is_cancelled() {
        "aborted after shutdown grace period".to_string()
    } else {
        format!("page task panicked: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(success: bool, ok: usize, failed: usize) -> PageResult {
        let mut result = PageResult::failed("https://a.example", "x", 10);
        result.success = success;
        result.success_count = ok;
        result.fail_count = failed;
        result.total_count = ok + failed;
        result
    }

    #[test]
    fn test_counters_aggregate_pages() {
        let counters = BatchCounters::default();
        let pages = vec![page(true, 3, 1), page(false, 0, 0), page(true, 2, 0)];
        for p in &pages {
            counters.record(p);
        }
        let result = counters.to_result(pages, 42);

        assert!(!result.success);
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.success_pages + result.fail_pages, result.total_pages);
        assert_eq!(result.total_images, 6);
        assert_eq!((result.success_images, result.fail_images), (5, 1));
        let summed: usize = result.page_results.iter().map(|p| p.total_count).sum();
        assert_eq!(summed, result.total_images);
    }

    #[tokio::test]
    async fn test_watchdog_aborts_stuck_tasks_after_grace() {
        let token = CancellationToken::new();
        let finished = CancellationToken::new();
        let stuck = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        let watchdog = tokio::spawn(shutdown_watchdog(
            token.clone(),
            finished.clone(),
            Duration::from_millis(50),
            vec![stuck.abort_handle()],
        ));

        token.cancel();
        let err = stuck.await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(join_failure(&err), "aborted after shutdown grace period");
        watchdog.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_leaves_finished_batch_alone() {
        let token = CancellationToken::new();
        let finished = CancellationToken::new();
        let task = tokio::spawn(async { 7 });
        let watchdog = tokio::spawn(shutdown_watchdog(
            token,
            finished.clone(),
            Duration::from_millis(10),
            vec![task.abort_handle()],
        ));

        assert_eq!(task.await.unwrap(), 7);
        finished.cancel();
        watchdog.await.unwrap();
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let result = BatchCounters::default().to_result(Vec::new(), 0);
        assert!(result.success);
        assert_eq!(result.total_pages, 0);
    }
}
