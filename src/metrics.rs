// Performance metrics module
//
// Provides lightweight metrics tracking for packer runs and update checks

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session-wide counters.
///
/// Uses atomic operations for thread-safe metric tracking without locks, since
/// the per-file tasks of a batch window record concurrently.
#[derive(Debug)]
pub struct Metrics {
    /// Files the packer processed successfully
    pub files_succeeded: AtomicUsize,

    /// Files that failed or were cancelled
    pub files_failed: AtomicUsize,

    /// Batch runs started (single-file runs are not counted)
    pub batches_run: AtomicUsize,

    /// Cumulative wall time of successful packer calls in milliseconds
    pub total_pack_time_ms: AtomicU64,

    pub update_checks: AtomicU64,

    pub downloads_started: AtomicU64,

    pub downloads_failed: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            files_succeeded: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            batches_run: AtomicUsize::new(0),
            total_pack_time_ms: AtomicU64::new(0),
            update_checks: AtomicU64::new(0),
            downloads_started: AtomicU64::new(0),
            downloads_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a processed file and how long its packer call took
    pub fn record_file_succeeded(&self, duration: Duration) {
        self.files_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_pack_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_check(&self) {
        self.update_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_failed(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average packer time per successful file in milliseconds
    pub fn avg_pack_time_ms(&self) -> f64 {
        let total = self.total_pack_time_ms.load(Ordering::Relaxed);
        let count = self.files_succeeded.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} succeeded, {} failed across {} batches",
            self.files_succeeded.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed),
            self.batches_run.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total pack time: {:.2}s (avg: {:.2}ms per file)",
            self.total_pack_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_pack_time_ms()
        );
        tracing::info!(
            "Update checks: {}, downloads: {} started, {} failed",
            self.update_checks.load(Ordering::Relaxed),
            self.downloads_started.load(Ordering::Relaxed),
            self.downloads_failed.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.files_succeeded.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.files_failed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_file_outcomes() {
        let metrics = Metrics::new();

        metrics.record_file_succeeded(Duration::from_millis(100));
        metrics.record_file_succeeded(Duration::from_millis(200));
        metrics.record_file_failed();
        metrics.record_batch();

        assert_eq!(metrics.files_succeeded.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.files_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.batches_run.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_pack_time_ms.load(Ordering::Relaxed), 300);
        assert_eq!(metrics.avg_pack_time_ms(), 150.0);
    }

    #[test]
    fn test_avg_pack_time_no_files() {
        let metrics = Metrics::new();
        assert_eq!(metrics.avg_pack_time_ms(), 0.0);
    }

    #[test]
    fn test_update_counters() {
        let metrics = Metrics::new();

        metrics.record_update_check();
        metrics.record_download_started();
        metrics.record_download_failed();

        assert_eq!(metrics.update_checks.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.downloads_started.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.downloads_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uptime() {
        let metrics = Metrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
