use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone)]
pub struct FileMeta {
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub modified: SystemTime,
}

impl FileMeta {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub free: u64,
    pub total: u64,
}

/// True for "not found" class errors — routinely recovered (idempotent
/// delete/rename per §7 propagation policy).
pub fn is_not_exist(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}

/// Permission errors get a dedicated detection path so "can't stat" is
/// never conflated with "gone" (§7).
pub fn is_permission(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::PermissionDenied
}

/// Transient conditions worth a retry (interrupted syscalls, resource
/// exhaustion), distinct from permanent failures.
pub fn is_temporary(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
    )
}

#[cfg(unix)]
pub fn path_separator() -> char {
    '/'
}
#[cfg(not(unix))]
pub fn path_separator() -> char {
    '\\'
}
