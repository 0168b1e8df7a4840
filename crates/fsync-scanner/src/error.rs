use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already in progress for this folder")]
    AlreadyScanning,
    #[error("state transition rejected: {0}")]
    State(#[from] fsync_statetracker::StateTrackerError),
    #[error("walking {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
