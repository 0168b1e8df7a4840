use std::collections::HashMap;

use fsync_fileset::{DeviceId, FileSet};
use fsync_ignore::IgnoreMatcher;
use fsync_model::{BlockInfo, FileInfo, StrongHash};

/// Characters forbidden in a filename on at least one supported target OS
/// (Windows). Checked unconditionally so a file created on a permissive
/// platform never produces a name another peer's OS can't materialize.
const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// True if every path component of `name` is representable on every
/// supported platform (§4.3.1 "path invalid on current OS").
pub fn path_is_valid(name: &str) -> bool {
    name.split('/').all(|component| {
        !component.is_empty()
            && !component.chars().any(|c| INVALID_NAME_CHARS.contains(&c) || c.is_control())
            && !component.ends_with('.')
            && !component.ends_with(' ')
    })
}

/// Outcome of partitioning `FileSet::need(local)` (§4.3.1).
#[derive(Debug, Default)]
pub struct NeedSet {
    /// Directories and symlinks, ordered by path depth ascending so parents
    /// land before children.
    pub process_directly: Vec<FileInfo>,
    /// Regular files with at least one connected device offering them,
    /// in discovery order (reordered by the caller per §4.3.2).
    pub queued: Vec<FileInfo>,
    /// Deleted regular files, keyed by name.
    pub file_deletions: HashMap<String, FileInfo>,
    /// Deleted directories.
    pub directory_deletions: Vec<FileInfo>,
    /// First-block strong hash -> candidate deletion names, for rename
    /// detection (§4.3.1).
    pub rename_buckets: HashMap<StrongHash, Vec<String>>,
    /// Entries that must be marked invalid in the database (ignored, or an
    /// unsupported symlink).
    pub to_invalidate: Vec<FileInfo>,
    /// Names whose path failed the current-OS validity check.
    pub invalid_paths: Vec<String>,
    /// False once `queued.len()` hit `max_queue` and enumeration stopped
    /// early; the caller must re-run need-set enumeration next iteration.
    pub finished: bool,
}

/// Enumerates and partitions the need-set for `local_device` (§4.3.1).
/// `connected` lists devices currently reachable; `symlinks_supported`
/// reflects the host platform.
pub fn enumerate(
    file_set: &dyn FileSet,
    local_device: DeviceId,
    ignore: &IgnoreMatcher,
    connected: &[DeviceId],
    ignore_delete: bool,
    symlinks_supported: bool,
    max_queue: usize,
) -> NeedSet {
    let mut out = NeedSet {
        finished: true,
        ..Default::default()
    };

    for f in file_set.need(local_device) {
        if ignore_delete && f.deleted {
            continue;
        }
        if ignore.is_ignored(&f.name) {
            let mut invalidated = f.clone();
            invalidated.invalid = true;
            out.to_invalidate.push(invalidated);
            continue;
        }
        if !path_is_valid(&f.name) {
            out.invalid_paths.push(f.name.clone());
            continue;
        }

        if f.deleted {
            if f.is_directory() {
                out.directory_deletions.push(f);
            } else {
                if f.is_regular() {
                    if let Some(first) = f.blocks.first() {
                        out.rename_buckets.entry(first.hash).or_default().push(f.name.clone());
                    }
                }
                out.file_deletions.insert(f.name.clone(), f);
            }
            continue;
        }

        if f.is_regular() {
            let offering: Vec<DeviceId> = file_set
                .availability(&f.name)
                .into_iter()
                .filter(|d| connected.contains(d))
                .collect();
            if !offering.is_empty() {
                out.queued.push(f);
                if out.queued.len() >= max_queue {
                    out.finished = false;
                    break;
                }
            }
            continue;
        }

        if f.is_symlink() {
            if symlinks_supported {
                out.process_directly.push(f);
            } else {
                let mut invalidated = f.clone();
                invalidated.invalid = true;
                out.to_invalidate.push(invalidated);
            }
            continue;
        }

        out.process_directly.push(f);
    }

    out.process_directly.sort_by_key(|f| f.path_depth());
    out
}

/// If a pending deletion's full block list equals `needed`'s, the pull can
/// be short-circuited into a rename instead of a fresh copy/fetch (§4.3.1).
/// Returns the candidate's name and removes it from both the bucket and the
/// deletion map so it isn't also processed as a deletion.
pub fn find_rename_candidate(
    rename_buckets: &mut HashMap<StrongHash, Vec<String>>,
    file_deletions: &mut HashMap<String, FileInfo>,
    needed: &[BlockInfo],
) -> Option<String> {
    let first = needed.first()?;
    let bucket = rename_buckets.get_mut(&first.hash)?;
    let idx = bucket.iter().position(|name| {
        file_deletions
            .get(name)
            .map(|candidate| candidate.blocks.as_slice() == needed)
            .unwrap_or(false)
    })?;
    let name = bucket.remove(idx);
    file_deletions.remove(&name);
    Some(name)
}
