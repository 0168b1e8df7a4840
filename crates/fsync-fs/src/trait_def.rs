use std::io::{self, Read, Write};
use std::time::SystemTime;

use crate::meta::{FileMeta, Usage};

/// The filesystem abstraction the core consumes (§6). Paths are
/// slash-separated and relative to the folder root; implementations resolve
/// them against whatever root they were constructed with.
pub trait Filesystem: Send + Sync {
    fn lstat(&self, name: &str) -> io::Result<FileMeta>;
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
    /// Opens (creating if absent) a writable handle, used for temp files.
    fn open_write(&self, name: &str) -> io::Result<Box<dyn Write + Send>>;
    /// Writes `data` at `offset` into `name` (creating it if absent),
    /// without disturbing bytes outside the written range. Used by the
    /// copier/puller to commit blocks to a temp file in any order (§4.3.6).
    fn write_at(&self, name: &str, offset: u64, data: &[u8]) -> io::Result<()>;
    fn mkdir(&self, name: &str, mode: u32) -> io::Result<()>;
    fn mkdir_all(&self, name: &str, mode: u32) -> io::Result<()>;
    fn remove(&self, name: &str) -> io::Result<()>;
    fn remove_all(&self, name: &str) -> io::Result<()>;
    fn rename(&self, src: &str, dst: &str) -> io::Result<()>;
    fn chmod(&self, name: &str, mode: u32) -> io::Result<()>;
    fn chtimes(&self, name: &str, mtime: SystemTime) -> io::Result<()>;
    fn lchown(&self, name: &str, uid: u32, gid: u32) -> io::Result<()>;
    fn create_symlink(&self, target: &str, path: &str) -> io::Result<()>;
    /// Names directly under `name` (non-recursive), for directory-deletion
    /// partitioning (§4.3.7).
    fn dir_names(&self, name: &str) -> io::Result<Vec<String>>;
    /// Filenames (relative to root) matching a shell glob, for conflict-copy
    /// enumeration (§4.3.8).
    fn glob(&self, pattern: &str) -> io::Result<Vec<String>>;
    fn usage(&self, name: &str) -> io::Result<Usage>;
}
