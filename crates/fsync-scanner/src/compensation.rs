use std::time::{Duration, SystemTime};

use fsync_fs::FileMeta;

/// If more than this much wall-clock time passes between scans, a full walk
/// runs instead of trusting mtime deltas (clock skew/resume-from-suspend
/// could otherwise hide changes). Mirrors the teacher's compensation-scan
/// fallback window.
const COMPENSATION_WINDOW: Duration = Duration::from_secs(3600);

/// Tracks when the folder was last fully scanned and lets per-entry mtime
/// comparisons skip hashing unchanged files between full scans (§4.2
/// `[SUPPLEMENT]` compensation-scan mode).
#[derive(Debug, Default)]
pub struct CompensationScanner {
    last_scan: Option<SystemTime>,
}

impl CompensationScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a full walk (ignoring mtime shortcuts) should run: either no
    /// prior scan is recorded, or the gap since the last one exceeds the
    /// compensation window.
    pub fn needs_full_scan(&self, now: SystemTime) -> bool {
        match self.last_scan {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|gap| gap > COMPENSATION_WINDOW)
                .unwrap_or(true),
        }
    }

    pub fn record_scan(&mut self, at: SystemTime) {
        self.last_scan = Some(at);
    }

    /// True if `meta`'s mtime matches the previously recorded one exactly,
    /// meaning the entry can be trusted unchanged without rehashing.
    pub fn unchanged_by_mtime(prior_modified_s: i64, meta: &FileMeta) -> bool {
        let meta_s = meta
            .modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        meta_s == prior_modified_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::EntryKind;

    fn meta_at(secs: u64) -> FileMeta {
        FileMeta {
            kind: EntryKind::File,
            size: 0,
            mode: 0o644,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn needs_full_scan_initially() {
        let c = CompensationScanner::new();
        assert!(c.needs_full_scan(SystemTime::now()));
    }

    #[test]
    fn no_full_scan_needed_within_window() {
        let mut c = CompensationScanner::new();
        let t0 = SystemTime::now();
        c.record_scan(t0);
        assert!(!c.needs_full_scan(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn full_scan_needed_after_window_elapses() {
        let mut c = CompensationScanner::new();
        let t0 = SystemTime::now();
        c.record_scan(t0);
        assert!(c.needs_full_scan(t0 + COMPENSATION_WINDOW + Duration::from_secs(1)));
    }

    #[test]
    fn unchanged_by_mtime_detects_match_and_mismatch() {
        assert!(CompensationScanner::unchanged_by_mtime(100, &meta_at(100)));
        assert!(!CompensationScanner::unchanged_by_mtime(100, &meta_at(101)));
    }
}
