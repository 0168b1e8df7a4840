use std::time::{Duration, UNIX_EPOCH};

use fsync_fs::Filesystem;
use fsync_model::FileInfo;

use crate::error::PullFileError;

/// Applies a metadata-only shortcut: chmod if needed, chtimes, and merges
/// `needed`'s version into the caller-supplied local version. No block I/O
/// is performed. Returns the merged version to persist.
pub fn apply_shortcut(
    fs: &dyn Filesystem,
    needed: &FileInfo,
    local_version: &fsync_model::Vector,
    ignore_perms: bool,
) -> Result<fsync_model::Vector, PullFileError> {
    if !ignore_perms && !needed.no_permissions {
        let current = fs.lstat(&needed.name)?;
        if current.mode != needed.permissions {
            fs.chmod(&needed.name, needed.permissions)?;
        }
    }
    let mtime = UNIX_EPOCH
        + Duration::from_secs(needed.modified_s.max(0) as u64)
        + Duration::from_nanos(needed.modified_ns.max(0) as u64);
    fs.chtimes(&needed.name, mtime)?;

    Ok(local_version.merge(&needed.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use fsync_model::{FileType, Vector};

    fn file_info(name: &str, mode: u32) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 0,
            permissions: mode,
            modified_s: 1_000,
            modified_ns: 0,
            modified_by: 2,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: 0,
            version: {
                let mut v = Vector::new();
                v.update(2);
                v
            },
            sequence: 0,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        }
    }

    #[test]
    fn apply_shortcut_merges_versions_without_io() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap();
        fs.chmod("a.txt", 0o644).unwrap();
        let needed = file_info("a.txt", 0o644);
        let mut local_version = Vector::new();
        local_version.update(1);
        let merged = apply_shortcut(&fs, &needed, &local_version, false).unwrap();
        assert!(merged.counter(1) > 0);
        assert!(merged.counter(2) > 0);
    }

    #[test]
    fn apply_shortcut_chmods_when_mode_differs() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap();
        fs.chmod("a.txt", 0o600).unwrap();
        let needed = file_info("a.txt", 0o644);
        let local_version = Vector::new();
        apply_shortcut(&fs, &needed, &local_version, false).unwrap();
        assert_eq!(fs.lstat("a.txt").unwrap().mode, 0o644);
    }
}
