//! Filesystem abstraction consumed by the core (§6): lstat/open/rename/
//! chtimes/watch and friends, plus a real (`StdFilesystem`) and in-memory
//! (`MemFilesystem`) implementation.

mod mem_fs;
mod meta;
mod std_fs;
mod trait_def;
mod watch;

pub use mem_fs::MemFilesystem;
pub use meta::{is_not_exist, is_permission, is_temporary, path_separator, EntryKind, FileMeta, Usage};
pub use std_fs::{traverses_symlink, StdFilesystem};
pub use trait_def::Filesystem;
pub use watch::{watch as watch_root, FsEvent, WatchError, WatchHandle};
