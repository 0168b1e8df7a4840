use std::time::{Duration, UNIX_EPOCH};

use chrono::Utc;
use fsync_fs::{is_not_exist, Filesystem};
use fsync_model::{FileInfo, ShortId, Vector};
use fsync_versioner::Versioner;

use crate::conflict;
use crate::error::PullFileError;

/// The version a finished file should be persisted with, decided by
/// `perform_finish`'s replace strategy.
pub struct FinishOutcome {
    pub version: Vector,
}

/// Runs the finisher over a completed pull: chmod, stat-and-verify-
/// unchanged, replace strategy, atomic rename, chtimes (§4.3.6 finisher).
/// `local_snapshot` is the `FileInfo` the scanner last recorded for this
/// name, used to detect whether the target changed underneath us since
/// scanning.
pub fn perform_finish(
    fs: &dyn Filesystem,
    versioner: &dyn Versioner,
    info: &FileInfo,
    temp_name: &str,
    local_snapshot: Option<&FileInfo>,
    self_id: ShortId,
    max_conflicts: i64,
    ignore_perms: bool,
) -> Result<FinishOutcome, PullFileError> {
    if !ignore_perms && !info.no_permissions {
        fs.chmod(temp_name, info.permissions)?;
    }

    let version = match fs.lstat(&info.name) {
        Ok(meta) => {
            if let Some(snapshot) = local_snapshot {
                let unchanged = meta.size == snapshot.size
                    && meta.modified
                        == UNIX_EPOCH + Duration::from_secs(snapshot.modified_s.max(0) as u64)
                    && meta.kind == snapshot_kind(snapshot);
                if !unchanged {
                    return Err(PullFileError::ModifiedNotRescanned(info.name.clone()));
                }
            }

            let existing_version = local_snapshot.map(|s| s.version.clone()).unwrap_or_default();
            if meta.is_dir() || meta.is_symlink() {
                fs.remove_all(&info.name)?;
                info.version.clone()
            } else {
                let merged = conflict::resolve(
                    fs,
                    &info.name,
                    &existing_version,
                    &info.version,
                    self_id,
                    max_conflicts,
                    Utc::now(),
                )?;
                // `conflict::resolve` already renamed or removed the prior
                // file on conflict; only archive what's still at the name.
                if fs.lstat(&info.name).is_ok() {
                    versioner.archive(fs, &info.name)?;
                }
                merged
            }
        }
        Err(e) if is_not_exist(&e) => info.version.clone(),
        Err(e) => return Err(e.into()),
    };

    fs.rename(temp_name, &info.name)?;

    let mtime = UNIX_EPOCH
        + Duration::from_secs(info.modified_s.max(0) as u64)
        + Duration::from_nanos(info.modified_ns.max(0) as u64);
    let _ = fs.chtimes(&info.name, mtime);

    tracing::info!(component = "finisher", file = %info.name, "HandleFile");

    Ok(FinishOutcome { version })
}

fn snapshot_kind(snapshot: &FileInfo) -> fsync_fs::EntryKind {
    if snapshot.is_directory() {
        fsync_fs::EntryKind::Dir
    } else if snapshot.is_symlink() {
        fsync_fs::EntryKind::Symlink
    } else {
        fsync_fs::EntryKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use fsync_model::FileType;
    use fsync_versioner::NoopVersioner;
    use std::io::Write as _;

    fn file_info(name: &str) -> FileInfo {
        let mut v = Vector::new();
        v.update(2);
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 4,
            permissions: 0o644,
            modified_s: 1000,
            modified_ns: 0,
            modified_by: 2,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: 0,
            version: v,
            sequence: 1,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        }
    }

    #[test]
    fn perform_finish_renames_temp_to_target_when_absent() {
        let fs = MemFilesystem::new();
        fs.open_write("t").unwrap().write_all(b"data").unwrap();
        let info = file_info("a.txt");
        let outcome =
            perform_finish(&fs, &NoopVersioner, &info, "t", None, 1, -1, false).unwrap();
        assert!(fs.lstat("a.txt").is_ok());
        assert!(fs.lstat("t").is_err());
        assert_eq!(outcome.version, info.version);
    }

    #[test]
    fn perform_finish_fails_when_target_modified_since_scan() {
        let fs = MemFilesystem::new();
        fs.open_write("t").unwrap().write_all(b"data").unwrap();
        fs.open_write("a.txt").unwrap().write_all(b"surprise").unwrap();
        let info = file_info("a.txt");
        let snapshot = {
            let mut s = file_info("a.txt");
            s.size = 4;
            s
        };
        let err =
            perform_finish(&fs, &NoopVersioner, &info, "t", Some(&snapshot), 1, -1, false)
                .unwrap_err();
        assert!(matches!(err, PullFileError::ModifiedNotRescanned(_)));
    }

    #[test]
    fn perform_finish_chtimes_to_info_modified_time() {
        let fs = MemFilesystem::new();
        fs.open_write("t").unwrap().write_all(b"data").unwrap();
        let info = file_info("a.txt");
        perform_finish(&fs, &NoopVersioner, &info, "t", None, 1, -1, false).unwrap();
        let meta = fs.lstat("a.txt").unwrap();
        assert_eq!(meta.modified, UNIX_EPOCH + Duration::from_secs(1000));
    }
}
