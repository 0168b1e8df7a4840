use chrono::{DateTime, Utc};
use fsync_fs::Filesystem;
use fsync_model::{in_conflict, ShortId, Vector};

/// Builds the `<base>.sync-conflict-YYYYMMDD-HHMMSS-<short-id><ext>` name
/// for `name`, splitting on the last `.` so the original extension survives
/// (§4.3.8).
pub fn conflict_name(name: &str, at: DateTime<Utc>, self_id: ShortId) -> String {
    let stamp = at.format("%Y%m%d-%H%M%S");
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => {
            format!("{base}.sync-conflict-{stamp}-{self_id:08x}.{ext}")
        }
        _ => format!("{name}.sync-conflict-{stamp}-{self_id:08x}"),
    }
}

/// Glob pattern matching every conflict copy of `name`, for cap enforcement.
pub fn conflict_glob(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((base, _ext)) if !base.is_empty() => format!("{base}.sync-conflict-*"),
        _ => format!("{name}.sync-conflict-*"),
    }
}

/// True iff `name` already carries the conflict-copy suffix — such files
/// are never nested into a further conflict copy, only removed by the cap.
pub fn is_conflict_copy(name: &str) -> bool {
    name.contains(".sync-conflict-")
}

/// Applies the conflict policy to a replace/delete of `existing` by
/// `replacement_version` (§4.3.8). If in conflict, renames the existing
/// file to a conflict copy (unless `max_conflicts == 0`, in which case it is
/// simply dropped) and enforces `max_conflicts` by removing the oldest
/// surviving copies beyond the cap. Returns the merged version to store for
/// the replacement.
pub fn resolve(
    fs: &dyn Filesystem,
    existing_name: &str,
    existing_version: &Vector,
    replacement_version: &Vector,
    self_id: ShortId,
    max_conflicts: i64,
    now: DateTime<Utc>,
) -> std::io::Result<Vector> {
    if !in_conflict(existing_version, replacement_version, self_id) {
        return Ok(replacement_version.clone());
    }

    if max_conflicts != 0 && !is_conflict_copy(existing_name) {
        let copy_name = conflict_name(existing_name, now, self_id);
        fs.rename(existing_name, &copy_name)?;
        if max_conflicts > 0 {
            enforce_cap(fs, existing_name, max_conflicts as usize)?;
        }
    } else {
        fs.remove(existing_name)?;
    }

    Ok(existing_version.merge(replacement_version))
}

fn enforce_cap(fs: &dyn Filesystem, name: &str, max_conflicts: usize) -> std::io::Result<()> {
    let mut copies = fs.glob(&conflict_glob(name))?;
    // Newest first: reverse-lexicographic sort on the embedded timestamp
    // puts the most recent `sync-conflict-YYYYMMDD-HHMMSS` copy first.
    copies.sort_by(|a, b| b.cmp(a));
    for stale in copies.into_iter().skip(max_conflicts) {
        fs.remove(&stale)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fsync_fs::MemFilesystem;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn conflict_name_preserves_extension() {
        let n = conflict_name("dir/a.txt", ts(), 0xabcd1234);
        assert_eq!(n, "dir/a.sync-conflict-20260102-030405-abcd1234.txt");
    }

    #[test]
    fn conflict_name_without_extension() {
        let n = conflict_name("README", ts(), 1);
        assert_eq!(n, "README.sync-conflict-20260102-030405-00000001");
    }

    #[test]
    fn resolve_renames_to_conflict_copy_when_in_conflict() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap();
        let mut existing = Vector::new();
        existing.update(1);
        let mut replacement = Vector::new();
        replacement.update(2);
        resolve(&fs, "a.txt", &existing, &replacement, 1, -1, ts()).unwrap();
        assert!(fs.lstat("a.txt").is_err());
        assert!(fs
            .glob("a.sync-conflict-*")
            .unwrap()
            .iter()
            .any(|n| n.starts_with("a.sync-conflict-")));
    }

    #[test]
    fn resolve_drops_copy_when_max_conflicts_zero() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap();
        let mut existing = Vector::new();
        existing.update(1);
        let mut replacement = Vector::new();
        replacement.update(2);
        resolve(&fs, "a.txt", &existing, &replacement, 1, 0, ts()).unwrap();
        assert!(fs.lstat("a.txt").is_err());
        assert!(fs.glob("a.sync-conflict-*").unwrap().is_empty());
    }

    #[test]
    fn resolve_is_noop_when_replacement_cleanly_dominates() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap();
        let existing = Vector::new();
        let mut replacement = Vector::new();
        replacement.update(2);
        resolve(&fs, "a.txt", &existing, &replacement, 1, -1, ts()).unwrap();
        assert!(fs.lstat("a.txt").is_ok());
    }

    #[test]
    fn enforce_cap_removes_oldest_beyond_limit() {
        let fs = MemFilesystem::new();
        fs.open_write("a.sync-conflict-20260101-000000-00000001.txt").unwrap();
        fs.open_write("a.sync-conflict-20260102-000000-00000001.txt").unwrap();
        fs.open_write("a.sync-conflict-20260103-000000-00000001.txt").unwrap();
        enforce_cap(&fs, "a.txt", 2).unwrap();
        assert!(fs.lstat("a.sync-conflict-20260101-000000-00000001.txt").is_err());
        assert!(fs.lstat("a.sync-conflict-20260102-000000-00000001.txt").is_ok());
        assert!(fs.lstat("a.sync-conflict-20260103-000000-00000001.txt").is_ok());
    }
}
