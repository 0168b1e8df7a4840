use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::meta::{EntryKind, FileMeta, Usage};
use crate::trait_def::Filesystem;

/// `Filesystem` implementation rooted at a real directory on disk. Every
/// method rejects names that escape the root (`..` components), matching
/// `vrift-cas`'s preference for hard path-containment checks over trusting
/// callers.
pub struct StdFilesystem {
    root: PathBuf,
}

impl StdFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        if name.split('/').any(|c| c == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes folder root: {name}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

fn meta_from_std(meta: &fs::Metadata) -> FileMeta {
    let kind = if meta.file_type().is_symlink() {
        EntryKind::Symlink
    } else if meta.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    };
    FileMeta {
        kind,
        size: meta.len(),
        mode: meta.permissions().mode(),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

impl Filesystem for StdFilesystem {
    fn lstat(&self, name: &str) -> io::Result<FileMeta> {
        let path = self.resolve(name)?;
        let meta = fs::symlink_metadata(path)?;
        Ok(meta_from_std(&meta))
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = self.resolve(name)?;
        Ok(Box::new(File::open(path)?))
    }

    fn open_write(&self, name: &str) -> io::Result<Box<dyn Write + Send>> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Box::new(file))
    }

    fn write_at(&self, name: &str, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        file.write_all_at(data, offset)
    }

    fn mkdir(&self, name: &str, mode: u32) -> io::Result<()> {
        let path = self.resolve(name)?;
        fs::create_dir(&path)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))
    }

    fn mkdir_all(&self, name: &str, mode: u32) -> io::Result<()> {
        let path = self.resolve(name)?;
        fs::create_dir_all(&path)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        let path = self.resolve(name)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir(path),
            Ok(_) => fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn remove_all(&self, name: &str) -> io::Result<()> {
        let path = self.resolve(name)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, src: &str, dst: &str) -> io::Result<()> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)
    }

    fn chmod(&self, name: &str, mode: u32) -> io::Result<()> {
        let path = self.resolve(name)?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn chtimes(&self, name: &str, mtime: SystemTime) -> io::Result<()> {
        let path = self.resolve(name)?;
        let mtime = filetime_from_system_time(mtime);
        nix::sys::stat::utimensat(
            None,
            &path,
            &mtime,
            &mtime,
            nix::sys::stat::UtimensatFlags::NoFollowSymlink,
        )
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
    }

    fn lchown(&self, name: &str, uid: u32, gid: u32) -> io::Result<()> {
        let path = self.resolve(name)?;
        nix::unistd::fchownat(
            None,
            &path,
            Some(nix::unistd::Uid::from_raw(uid)),
            Some(nix::unistd::Gid::from_raw(gid)),
            nix::unistd::FchownatFlags::NoFollowSymlink,
        )
        .map_err(|e| io::Error::from_raw_os_error(e as i32))
    }

    fn create_symlink(&self, target: &str, path: &str) -> io::Result<()> {
        let path = self.resolve(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        symlink(target, path)
    }

    fn dir_names(&self, name: &str) -> io::Result<Vec<String>> {
        let path = self.resolve(name)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<String>> {
        let full_pattern = self.root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        let mut out = Vec::new();
        for entry in glob::glob(&full_pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?
        {
            let path = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            if let Ok(rel) = path.strip_prefix(&self.root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(out)
    }

    fn usage(&self, name: &str) -> io::Result<Usage> {
        let path = self.resolve(name)?;
        let stat = nix::sys::statvfs::statvfs(&path)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        let block_size = stat.fragment_size().max(1) as u64;
        Ok(Usage {
            free: stat.blocks_available() as u64 * block_size,
            total: stat.blocks() as u64 * block_size,
        })
    }
}

fn filetime_from_system_time(t: SystemTime) -> nix::sys::time::TimeSpec {
    let dur = t
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    nix::sys::time::TimeSpec::new(dur.as_secs() as i64, dur.subsec_nanos() as i64)
}

/// True if any ancestor directory of `path` (excluding `path` itself) is a
/// symlink, i.e. traversal would escape through a symlinked parent.
pub fn traverses_symlink(root: &Path, rel: &str) -> io::Result<bool> {
    let mut cur = root.to_path_buf();
    for component in rel.split('/').filter(|c| !c.is_empty()) {
        cur.push(component);
        if cur == root.join(rel) {
            break;
        }
        match fs::symlink_metadata(&cur) {
            Ok(meta) if meta.file_type().is_symlink() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdFilesystem::new(dir.path());
        fs.mkdir("sub", 0o755).unwrap();
        {
            let mut w = fs.open_write("sub/a.txt").unwrap();
            w.write_all(b"hello").unwrap();
        }
        let mut buf = String::new();
        fs.open("sub/a.txt").unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn rename_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdFilesystem::new(dir.path());
        fs.open_write("a").unwrap().write_all(b"1").unwrap();
        fs.rename("a", "b").unwrap();
        assert!(fs.lstat("b").is_ok());
        assert!(fs.lstat("a").is_err());
    }

    #[test]
    fn path_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdFilesystem::new(dir.path());
        assert!(fs.lstat("../etc/passwd").is_err());
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdFilesystem::new(dir.path());
        assert!(fs.remove("nope").is_ok());
    }

    #[test]
    fn dir_names_lists_children() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StdFilesystem::new(dir.path());
        fs.mkdir("sub", 0o755).unwrap();
        fs.open_write("sub/x").unwrap();
        fs.open_write("sub/y").unwrap();
        let mut names = fs.dir_names("sub").unwrap();
        names.sort();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }
}
