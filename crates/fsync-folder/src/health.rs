//! Pre-pull health gate (§4.1): folder path reachable, marker file present,
//! home-disk free space above threshold.

use fsync_fs::Filesystem;

use crate::error::FolderHealthError;

pub struct HealthGate {
    pub marker_name: String,
    pub min_disk_free_pct: u8,
}

impl HealthGate {
    pub fn new(marker_name: impl Into<String>, min_disk_free_pct: u8) -> Self {
        Self {
            marker_name: marker_name.into(),
            min_disk_free_pct,
        }
    }

    pub fn check(&self, fs: &dyn Filesystem) -> Result<(), FolderHealthError> {
        fs.lstat("").map_err(FolderHealthError::PathUnreachable)?;
        fs.lstat(&self.marker_name)
            .map_err(|_| FolderHealthError::MarkerMissing(self.marker_name.clone()))?;

        let usage = fs.usage("").map_err(FolderHealthError::PathUnreachable)?;
        if usage.total == 0 {
            return Ok(());
        }
        let free_pct = usage.free as f64 / usage.total as f64 * 100.0;
        if free_pct < self.min_disk_free_pct as f64 {
            return Err(FolderHealthError::LowDiskSpace {
                free_pct,
                min_pct: self.min_disk_free_pct,
            });
        }
        Ok(())
    }
}
