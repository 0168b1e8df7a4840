use thiserror::Error;

/// Health-gate failure (§4.1): any of these sets the folder error state and
/// skips the pull that would otherwise have run.
#[derive(Debug, Error)]
pub enum FolderHealthError {
    #[error("folder path unreachable: {0}")]
    PathUnreachable(#[source] std::io::Error),
    #[error("marker file missing: {0}")]
    MarkerMissing(String),
    #[error("home disk free space {free_pct:.1}% below threshold {min_pct}%")]
    LowDiskSpace { free_pct: f64, min_pct: u8 },
}

/// Surfaced by [`crate::runtime::FolderHandle::scan`] when the requested
/// scan itself failed.
#[derive(Debug, Error)]
pub enum FolderError {
    #[error(transparent)]
    Scan(#[from] fsync_scanner::ScanError),
    #[error(transparent)]
    Revert(#[from] std::io::Error),
    #[error("folder runtime already stopped")]
    Stopped,
}
