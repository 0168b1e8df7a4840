use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::file_info::FileInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderState {
    Idle,
    Scanning,
    ScanWaiting,
    SyncWaiting,
    SyncPreparing,
    Syncing,
    Cleaning,
    CleanWaiting,
    Error,
}

impl FolderState {
    pub fn is_error(&self) -> bool {
        matches!(self, FolderState::Error)
    }
}

/// Per-file record tracking an in-flight pull.
#[derive(Debug, Clone)]
pub struct PullerState {
    pub file: FileInfo,
    pub temp_name: PathBuf,
    pub real_name: PathBuf,
    pub copy_total: usize,
    pub copy_needed: usize,
    pub pull_total: usize,
    pub reused: usize,
    pub copied_from_origin: usize,
    pub copied_from_origin_shifted: usize,
    /// Target block indices already present in the temp file.
    pub available: Vec<usize>,
    pub created_at: SystemTime,
    pub error: Option<String>,
    pub closed: bool,
    pub finalized: bool,
}

impl PullerState {
    pub fn new(file: FileInfo, temp_name: PathBuf, real_name: PathBuf) -> Self {
        Self {
            file,
            temp_name,
            real_name,
            copy_total: 0,
            copy_needed: 0,
            pull_total: 0,
            reused: 0,
            copied_from_origin: 0,
            copied_from_origin_shifted: 0,
            available: Vec::new(),
            created_at: SystemTime::now(),
            error: None,
            closed: false,
            finalized: false,
        }
    }

    /// A puller state is closed once every block that needs copying or
    /// pulling has been accounted for (copied, pulled, or failed).
    pub fn final_close(&self) -> (bool, Option<&str>) {
        if let Some(err) = &self.error {
            return (true, Some(err.as_str()));
        }
        let accounted = self.reused
            + self.copied_from_origin
            + self.copied_from_origin_shifted
            + self.available.len();
        let done = accounted >= self.copy_needed && self.pull_total == 0;
        (done, None)
    }
}
