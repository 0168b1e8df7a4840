//! Folder-runtime counters (§13), modeled on
//! `vrift-cas::parallel_ingest::ParallelIngestStats`'s atomic-counter-then-
//! snapshot pattern: cheap to bump from any worker, read out as a plain
//! struct for `status`/`doctor`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FolderCounters {
    files_pulled: AtomicU64,
    bytes_pulled: AtomicU64,
    scans_completed: AtomicU64,
    pulls_failed: AtomicU64,
}

impl FolderCounters {
    pub fn record_pull_success(&self, files: u64, bytes: u64) {
        self.files_pulled.fetch_add(files, Ordering::Relaxed);
        self.bytes_pulled.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_pull_failure(&self) {
        self.pulls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan(&self) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FolderMetrics {
        FolderMetrics {
            files_pulled: self.files_pulled.load(Ordering::Relaxed),
            bytes_pulled: self.bytes_pulled.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            pulls_failed: self.pulls_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot exposed to the daemon's periodic log line and to `status`/
/// `doctor` (§4.1, §13).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderMetrics {
    pub files_pulled: u64,
    pub bytes_pulled: u64,
    pub scans_completed: u64,
    pub pulls_failed: u64,
}

impl FolderMetrics {
    pub fn log(&self, folder: &str, scan_duration: Duration) {
        tracing::info!(
            component = "folder",
            folder,
            files_pulled = self.files_pulled,
            bytes_pulled = self.bytes_pulled,
            scans_completed = self.scans_completed,
            pulls_failed = self.pulls_failed,
            scan_duration_s = scan_duration.as_secs_f64(),
            "folder metrics"
        );
    }
}
