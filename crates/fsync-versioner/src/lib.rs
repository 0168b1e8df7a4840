//! Versioner trait (§6): archives a file about to be replaced or deleted.
//! Out of scope in depth per the spec; this crate provides the trait
//! boundary plus the two simplest stand-ins so the finisher (§4.3.6) is
//! exercisable end to end.

use std::io;

use fsync_fs::Filesystem;

pub trait Versioner: Send + Sync {
    fn archive(&self, fs: &dyn Filesystem, name: &str) -> io::Result<()>;
}

/// Drops the replaced file on the floor; used when no versioning is
/// configured.
pub struct NoopVersioner;

impl Versioner for NoopVersioner {
    fn archive(&self, _fs: &dyn Filesystem, _name: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Moves the replaced file into a `.stversions` sibling tree, suffixed with
/// a timestamp, instead of deleting it outright.
pub struct TrashVersioner {
    archive_dir: String,
}

impl TrashVersioner {
    pub fn new(archive_dir: impl Into<String>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }
}

impl Versioner for TrashVersioner {
    fn archive(&self, fs: &dyn Filesystem, name: &str) -> io::Result<()> {
        let dest = format!("{}/{}", self.archive_dir, name);
        if let Some(parent) = dest.rsplit_once('/').map(|(p, _)| p) {
            fs.mkdir_all(parent, 0o755)?;
        }
        fs.rename(name, &dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use std::io::Write;

    #[test]
    fn noop_versioner_leaves_source_untouched() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"x").unwrap();
        NoopVersioner.archive(&fs, "a.txt").unwrap();
        assert!(fs.lstat("a.txt").is_ok());
    }

    #[test]
    fn trash_versioner_moves_into_archive_dir() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"x").unwrap();
        let v = TrashVersioner::new(".stversions");
        v.archive(&fs, "a.txt").unwrap();
        assert!(fs.lstat("a.txt").is_err());
        assert!(fs.lstat(".stversions/a.txt").is_ok());
    }
}
