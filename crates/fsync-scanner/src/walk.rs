use fsync_fs::Filesystem;
use fsync_ignore::IgnoreMatcher;

/// One filesystem entry discovered by a walk, before it has been turned into
/// a `FileInfo` (that step needs block hashing, done by the caller).
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub name: String,
    pub ignored: bool,
    pub deletable: bool,
}

/// Recursively lists every entry under `root` (a subpath, `""` for the whole
/// folder), depth-first, parents before children so callers can create
/// directories before their contents (§4.2 step 5).
///
/// Directories whose path matches the ignore matcher are not descended into
/// (their children never appear), matching Syncthing's documented ignore
/// semantics: an ignored directory hides everything beneath it.
pub fn walk(fs: &dyn Filesystem, root: &str, ignore: &IgnoreMatcher) -> std::io::Result<Vec<WalkEntry>> {
    let mut out = Vec::new();
    walk_into(fs, root, ignore, &mut out)?;
    Ok(out)
}

fn walk_into(
    fs: &dyn Filesystem,
    path: &str,
    ignore: &IgnoreMatcher,
    out: &mut Vec<WalkEntry>,
) -> std::io::Result<()> {
    let meta = fs.lstat(path)?;
    if !path.is_empty() {
        let m = ignore.matches(path);
        out.push(WalkEntry {
            name: path.to_string(),
            ignored: m.is_ignored,
            deletable: m.is_deletable,
        });
        if m.is_ignored {
            return Ok(());
        }
    }
    if meta.is_dir() {
        let mut children = fs.dir_names(path)?;
        children.sort();
        for child in children {
            let child_path = if path.is_empty() {
                child
            } else {
                format!("{path}/{child}")
            };
            walk_into(fs, &child_path, ignore, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use std::io::Write as _;

    #[test]
    fn walk_lists_files_and_dirs_parent_first() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("a/b", 0o755).unwrap();
        fs.open_write("a/b/f").unwrap().write_all(b"x").unwrap();
        let ignore = IgnoreMatcher::new();
        let entries = walk(&fs, "", &ignore).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a/b", "a/b/f"]);
    }

    #[test]
    fn walk_skips_descending_into_ignored_directory() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("ignDir/sub", 0o755).unwrap();
        fs.open_write("ignDir/sub/f").unwrap().write_all(b"x").unwrap();
        let ignore = IgnoreMatcher::with_patterns(&["ignDir"]);
        let entries = walk(&fs, "", &ignore).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ignDir");
        assert!(entries[0].ignored);
    }
}
