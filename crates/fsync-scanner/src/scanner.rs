use std::sync::Arc;

use fsync_fileset::{DeviceId, FileSet};
use fsync_fs::Filesystem;
use fsync_ignore::IgnoreMatcher;
use fsync_model::{FileInfo, FileInfoBatch, FileType, FolderState, LOCAL_FLAG_RECEIVE_ONLY};
use fsync_statetracker::StateTracker;
use tokio::sync::Semaphore;

use crate::error::ScanError;
use crate::hashing::hash_file_blocks;
use crate::unify::unify_subs;
use crate::walk::walk;

/// Items/bytes thresholds for the scanner's own `FileInfoBatch`es (§4.9).
const MAX_BATCH_ITEMS: usize = 1000;
const MAX_BATCH_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Drives one folder's filesystem walk against its index (§4.2).
///
/// Holds a single-permit semaphore so overlapping `scan` calls on the same
/// folder queue rather than race each other over the index and ignore
/// matcher (§5: "at most one scan per folder in flight").
pub struct Scanner {
    local_device: DeviceId,
    block_size: u32,
    receive_only: bool,
    permit: Arc<Semaphore>,
}

impl Scanner {
    pub fn new(local_device: DeviceId, block_size: u32, receive_only: bool) -> Self {
        Self {
            local_device,
            block_size,
            receive_only,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Runs a full scan over `subpaths` (empty => whole folder) against
    /// `fs`/`file_set`, updating `state` as it goes. Implements §4.2's
    /// 8-step algorithm.
    pub async fn scan(
        &self,
        fs: &dyn Filesystem,
        file_set: &dyn FileSet,
        ignore: &mut IgnoreMatcher,
        state: &StateTracker,
        subpaths: &[String],
    ) -> Result<ScanStats, ScanError> {
        // Step 1: normalize subpaths.
        let subpaths = unify_subs(subpaths);

        // Step 2: acquire the per-folder scan permit.
        let _permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| ScanError::AlreadyScanning)?;

        // Step 3: scanning state.
        state.set_state(FolderState::Scanning)?;

        // Step 4: reload .stignore and detect pattern changes.
        let previous_hash = ignore.hash();
        if let Ok(mut reader) = fs.open(".stignore") {
            use std::io::Read;
            let mut content = String::new();
            if reader.read_to_string(&mut content).is_ok() {
                *ignore = IgnoreMatcher::load(&content);
            }
        }
        let ignore_changed = ignore.hash() != previous_hash;
        if ignore_changed {
            tracing::info!(component = "scanner", "ignore patterns changed, forcing full have-walk");
        }

        let mut stats = ScanStats::default();
        let mut batch = FileInfoBatch::new(MAX_BATCH_ITEMS, MAX_BATCH_BYTES);

        // Step 5: walk the filesystem, producing FileInfo records.
        for root in &subpaths {
            let entries = walk(fs, root, ignore)
                .map_err(|source| ScanError::Walk { path: root.clone(), source })?;
            for entry in entries {
                if entry.ignored {
                    continue;
                }
                let meta = fs
                    .lstat(&entry.name)
                    .map_err(|source| ScanError::Walk { path: entry.name.clone(), source })?;

                let blocks = if meta.is_file() {
                    hash_file_blocks(fs, &entry.name, self.block_size)
                        .map_err(|source| ScanError::Walk { path: entry.name.clone(), source })?
                } else {
                    Vec::new()
                };

                let prior_local = file_set.get(self.local_device, &entry.name);
                let mut fi = FileInfo {
                    name: entry.name.clone(),
                    file_type: if meta.is_dir() {
                        FileType::Directory
                    } else if meta.is_symlink() {
                        FileType::Symlink
                    } else {
                        FileType::File
                    },
                    size: meta.size,
                    permissions: meta.mode,
                    modified_s: meta
                        .modified
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or(0),
                    modified_ns: 0,
                    modified_by: self.local_device,
                    deleted: false,
                    invalid: false,
                    no_permissions: false,
                    local_flags: 0,
                    version: Default::default(),
                    sequence: 0,
                    blocks,
                    symlink_target: String::new(),
                    block_size: if meta.is_file() { Some(self.block_size) } else { None },
                };

                let unchanged = match &prior_local {
                    Some(prior) => !prior.deleted && prior.same_content(&fi) && prior.file_type == fi.file_type,
                    None => false,
                };

                if unchanged {
                    stats.unchanged += 1;
                    continue;
                }

                self.apply_version_policy(&mut fi, prior_local.as_ref(), file_set);
                stats.updated += 1;
                batch.push(fi);
                batch.flush_if_full(|items| file_set.update(self.local_device, items));
            }
        }
        batch.flush(|items| file_set.update(self.local_device, items));

        // Step 7: walk the local have-set to find deletions and ignore flips.
        let mut deletions = FileInfoBatch::new(MAX_BATCH_ITEMS, MAX_BATCH_BYTES);
        for root in &subpaths {
            let prefix = root.clone();
            let mut have = Vec::new();
            file_set.with_prefixed_have_truncated(self.local_device, &prefix, &mut |f| {
                have.push(f.clone())
            });
            for mut f in have {
                if f.deleted {
                    continue;
                }
                let still_exists = fs.lstat(&f.name).is_ok();
                let now_ignored = ignore.is_ignored(&f.name);
                if !still_exists || now_ignored {
                    let prior = f.clone();
                    f.deleted = true;
                    f.blocks.clear();
                    self.apply_version_policy(&mut f, Some(&prior), file_set);
                    stats.removed += 1;
                    deletions.push(f);
                    deletions.flush_if_full(|items| file_set.update(self.local_device, items));
                }
            }
        }
        deletions.flush(|items| file_set.update(self.local_device, items));

        // Step 8: back to idle, report stats.
        state.set_state(FolderState::Idle)?;
        tracing::info!(
            component = "scanner",
            updated = stats.updated,
            removed = stats.removed,
            unchanged = stats.unchanged,
            "scan complete"
        );
        Ok(stats)
    }

    /// Assigns `fi`'s version following the receive-only mutation rules of
    /// §4.2 step 6, or plain local advancement otherwise.
    fn apply_version_policy(
        &self,
        fi: &mut FileInfo,
        prior_local: Option<&FileInfo>,
        file_set: &dyn FileSet,
    ) {
        let prior_version = prior_local.map(|f| f.version.clone()).unwrap_or_default();

        if !self.receive_only {
            let mut v = prior_version;
            v.update(self.local_device);
            fi.version = v;
            return;
        }

        match file_set.get_global(&fi.name) {
            Some(global) if fi.same_content(&global) => {
                // Local content now matches what the cluster already has:
                // adopt the global version and clear the local-only marker.
                fi.version = global.version;
                fi.clear_local_flag(LOCAL_FLAG_RECEIVE_ONLY);
            }
            _ => {
                // A local edit made under receive-only: it must never look
                // like it came from anyone but us.
                let mut v = prior_version;
                v.update(self.local_device);
                fi.version = v.drop_others(self.local_device);
                fi.set_local_flag(LOCAL_FLAG_RECEIVE_ONLY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fileset::InMemoryFileSet;
    use fsync_fs::MemFilesystem;
    use std::io::Write as _;

    #[tokio::test]
    async fn scanning_new_file_updates_index() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"hello").unwrap();
        let file_set = InMemoryFileSet::new();
        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(1, 4, false);

        let stats = scanner
            .scan(&fs, &file_set, &mut ignore, &state, &[])
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);
        assert!(file_set.get(1, "a.txt").is_some());
        assert_eq!(state.current(), FolderState::Idle);
    }

    #[tokio::test]
    async fn second_scan_with_no_changes_is_idempotent() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"hello").unwrap();
        let file_set = InMemoryFileSet::new();
        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(1, 4, false);

        scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        let second = scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(second.removed, 0);
    }

    #[tokio::test]
    async fn deleted_file_is_marked_deleted_on_rescan() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"hello").unwrap();
        let file_set = InMemoryFileSet::new();
        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(1, 4, false);
        scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();

        fs.remove("a.txt").unwrap();
        let stats = scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert!(file_set.get(1, "a.txt").unwrap().deleted);
    }

    #[tokio::test]
    async fn receive_only_local_edit_keeps_only_self_counter() {
        let fs = MemFilesystem::new();
        fs.open_write("a.txt").unwrap().write_all(b"hello").unwrap();
        let file_set = InMemoryFileSet::new();
        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(1, 4, true);

        scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        let f = file_set.get(1, "a.txt").unwrap();
        assert!(f.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        assert_eq!(f.version.counter(1), 1);
    }
}
