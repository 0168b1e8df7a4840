use serde::{Deserialize, Serialize};

use crate::block::BlockInfo;
use crate::vector::{ShortId, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// Bit in [`FileInfo::local_flags`]: a local change made under receive-only
/// mode that must never escape outward in index exchanges.
pub const LOCAL_FLAG_RECEIVE_ONLY: u32 = 1 << 0;
/// Bit in [`FileInfo::local_flags`]: the entry's content is suspect and
/// needs a rescan before it can be trusted.
pub const LOCAL_FLAG_MUST_RESCAN: u32 = 1 << 1;

/// Canonical metadata record for one filesystem entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Slash-separated path, relative to the folder root.
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub permissions: u32,
    pub modified_s: i64,
    pub modified_ns: i32,
    pub modified_by: ShortId,
    pub deleted: bool,
    pub invalid: bool,
    pub no_permissions: bool,
    pub local_flags: u32,
    pub version: Vector,
    pub sequence: i64,
    /// Empty if directory, symlink, or deleted.
    pub blocks: Vec<BlockInfo>,
    pub symlink_target: String,
    pub block_size: Option<u32>,
}

impl FileInfo {
    pub fn has_local_flag(&self, flag: u32) -> bool {
        self.local_flags & flag != 0
    }

    pub fn set_local_flag(&mut self, flag: u32) {
        self.local_flags |= flag;
    }

    pub fn clear_local_flag(&mut self, flag: u32) {
        self.local_flags &= !flag;
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    pub fn is_regular(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Two files with identical block-hash sequences have identical content.
    pub fn same_content(&self, other: &FileInfo) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|(a, b)| a.hash == b.hash)
    }

    /// Number of path components, used to order `process_directly` so
    /// parents are created before children.
    pub fn path_depth(&self) -> usize {
        self.name.split('/').filter(|s| !s.is_empty()).count()
    }
}

/// `in_conflict(current, replacement)` per the conflict policy: true iff the
/// two versions are concurrent, or iff `replacement` claims a counter for
/// `self_id` higher than `current` holds (our own counter advancing behind
/// our back, treated as corruption rather than trusted).
pub fn in_conflict(current: &Vector, replacement: &Vector, self_id: ShortId) -> bool {
    current.concurrent(replacement) || replacement.counter(self_id) > current.counter(self_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_file(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 0,
            permissions: 0o644,
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
    fn local_flags_roundtrip() {
        let mut f = empty_file("a");
        assert!(!f.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        f.set_local_flag(LOCAL_FLAG_RECEIVE_ONLY);
        assert!(f.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        f.clear_local_flag(LOCAL_FLAG_RECEIVE_ONLY);
        assert!(!f.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
    }

    #[test]
    fn path_depth_counts_components() {
        assert_eq!(empty_file("a/b/c").path_depth(), 3);
        assert_eq!(empty_file("a").path_depth(), 1);
    }

    #[test]
    fn in_conflict_true_for_concurrent_versions() {
        let mut a = Vector::new();
        a.update(1);
        let mut b = Vector::new();
        b.update(2);
        assert!(in_conflict(&a, &b, 1));
    }

    #[test]
    fn in_conflict_true_when_own_counter_advances_unexpectedly() {
        let mut current = Vector::new();
        current.update(1);
        let mut replacement = current.clone();
        replacement.update(1); // self_id's counter advanced in replacement
        assert!(in_conflict(&current, &replacement, 1));
    }

    #[test]
    fn in_conflict_false_for_clean_dominance_by_other() {
        let current = Vector::new();
        let mut replacement = Vector::new();
        replacement.update(2);
        assert!(!in_conflict(&current, &replacement, 1));
    }
}
