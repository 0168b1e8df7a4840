use fsync_fs::{is_not_exist, is_permission, Filesystem};
use fsync_model::FileInfo;

use crate::error::PullFileError;

/// setgid|setuid|sticky bits, retained across the `no_permissions` mask
/// since Syncthing's convention is that those bits reflect platform policy,
/// not file content (§4.3.3).
const RETAIN_MASK: u32 = 0o7000;

/// Creates or replaces the directory named by `info` (§4.3.3). If something
/// non-directory currently occupies the name, it is removed first.
pub fn apply_directory(
    fs: &dyn Filesystem,
    info: &FileInfo,
    ignore_perms: bool,
) -> Result<(), PullFileError> {
    if let Ok(meta) = fs.lstat(&info.name) {
        if !meta.is_dir() {
            fs.remove(&info.name)?;
        }
    }
    fs.mkdir_all(&info.name, 0o755)?;

    if !ignore_perms && !info.no_permissions {
        let current_mode = fs.lstat(&info.name).map(|m| m.mode).unwrap_or(0);
        let mode = (info.permissions & !RETAIN_MASK) | (current_mode & RETAIN_MASK);
        fs.chmod(&info.name, mode)?;
    }
    Ok(())
}

/// How a directory's child was classified during deletion (§4.3.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildKind {
    /// A temp file or an ignore-deletable match: safe to remove.
    Deletable,
    /// Present in the index, not deleted, not invalid: a real divergence.
    Known,
    /// Matches an ignore pattern, not marked deletable.
    Ignored,
    /// Not in the index at all: needs a rescan before we can decide.
    Unknown,
}

/// Classifies one child name for directory-deletion partitioning.
pub fn classify_child(
    name: &str,
    indexed: Option<&FileInfo>,
    ignore: &fsync_ignore::IgnoreMatcher,
    temp_prefix: &str,
) -> ChildKind {
    if name.starts_with(temp_prefix) {
        return ChildKind::Deletable;
    }
    let match_result = ignore.matches(name);
    if match_result.is_ignored {
        return if match_result.is_deletable {
            ChildKind::Deletable
        } else {
            ChildKind::Ignored
        };
    }
    match indexed {
        Some(f) if !f.deleted && !f.invalid => ChildKind::Known,
        Some(_) => ChildKind::Deletable,
        None => ChildKind::Unknown,
    }
}

/// Removes directory `name`, honoring the child-partition rules of §4.3.7.
/// `lookup` resolves a child's indexed `FileInfo`, if any. Returns the
/// subpaths that need a rescan (populated only on `DirHasToBeScanned`).
pub fn delete_directory(
    fs: &dyn Filesystem,
    name: &str,
    ignore: &fsync_ignore::IgnoreMatcher,
    temp_prefix: &str,
    lookup: impl Fn(&str) -> Option<FileInfo>,
) -> Result<(), PullFileError> {
    let children = match fs.dir_names(name) {
        Ok(c) => c,
        Err(e) if is_not_exist(&e) => return Ok(()),
        Err(e) if is_permission(&e) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut deletable = Vec::new();
    for child in &children {
        let full = format!("{name}/{child}");
        let indexed = lookup(&full);
        match classify_child(&full, indexed.as_ref(), ignore, temp_prefix) {
            ChildKind::Deletable => deletable.push(full),
            ChildKind::Known => return Err(PullFileError::DirNotEmpty(name.to_string())),
            ChildKind::Ignored => return Err(PullFileError::DirHasIgnored(name.to_string())),
            ChildKind::Unknown => {
                return Err(PullFileError::DirHasToBeScanned(name.to_string()))
            }
        }
    }

    for child in &deletable {
        match fs.remove(child) {
            Ok(()) => {}
            Err(e) if is_not_exist(&e) => {}
            Err(e) if is_permission(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }

    match fs.remove(name) {
        Ok(()) => Ok(()),
        Err(e) if is_not_exist(&e) => Ok(()),
        Err(e) if is_permission(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use fsync_ignore::IgnoreMatcher;
    use fsync_model::{FileType, Vector};

    fn dir_info(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::Directory,
            size: 0,
            permissions: 0o755,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 1,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: 0,
            version: Vector::new(),
            sequence: 0,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        }
    }

    #[test]
    fn apply_directory_creates_missing_dir() {
        let fs = MemFilesystem::new();
        apply_directory(&fs, &dir_info("a/b"), false).unwrap();
        assert!(fs.lstat("a/b").unwrap().is_dir());
    }

    #[test]
    fn apply_directory_replaces_occupying_file() {
        let fs = MemFilesystem::new();
        fs.open_write("a").unwrap();
        apply_directory(&fs, &dir_info("a"), false).unwrap();
        assert!(fs.lstat("a").unwrap().is_dir());
    }

    #[test]
    fn delete_directory_removes_empty_dir() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a", 0o755).unwrap();
        let ignore = IgnoreMatcher::new();
        delete_directory(&fs, "a", &ignore, ".stfolder/tmp-", |_| None).unwrap();
        assert!(fs.lstat("a").is_err());
    }

    #[test]
    fn delete_directory_removes_temp_and_ignored_deletable_children() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a", 0o755).unwrap();
        fs.open_write("a/.stfolder/tmp-x").unwrap();
        fs.open_write("a/cache.tmp").unwrap();
        let ignore = IgnoreMatcher::with_patterns(&["(?d)*.tmp"]);
        delete_directory(&fs, "a", &ignore, "a/.stfolder/tmp-", |_| None).unwrap();
        assert!(fs.lstat("a").is_err());
    }

    #[test]
    fn delete_directory_fails_with_known_child() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a", 0o755).unwrap();
        fs.open_write("a/x.txt").unwrap();
        let ignore = IgnoreMatcher::new();
        let mut known = dir_info("a/x.txt");
        known.file_type = FileType::File;
        let err = delete_directory(&fs, "a", &ignore, ".stfolder/tmp-", |n| {
            if n == "a/x.txt" { Some(known.clone()) } else { None }
        })
        .unwrap_err();
        assert!(matches!(err, PullFileError::DirNotEmpty(_)));
    }

    #[test]
    fn delete_directory_fails_with_unknown_child() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a", 0o755).unwrap();
        fs.open_write("a/mystery").unwrap();
        let ignore = IgnoreMatcher::new();
        let err = delete_directory(&fs, "a", &ignore, ".stfolder/tmp-", |_| None).unwrap_err();
        assert!(matches!(err, PullFileError::DirHasToBeScanned(_)));
    }

    #[test]
    fn delete_directory_fails_with_ignored_non_deletable_child() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a", 0o755).unwrap();
        fs.open_write("a/keep.bak").unwrap();
        let ignore = IgnoreMatcher::with_patterns(&["*.bak"]);
        let err = delete_directory(&fs, "a", &ignore, ".stfolder/tmp-", |_| None).unwrap_err();
        assert!(matches!(err, PullFileError::DirHasIgnored(_)));
    }

    #[test]
    fn delete_directory_missing_dir_is_success() {
        let fs = MemFilesystem::new();
        let ignore = IgnoreMatcher::new();
        delete_directory(&fs, "missing", &ignore, ".stfolder/tmp-", |_| None).unwrap();
    }
}
