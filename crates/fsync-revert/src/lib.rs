//! Receive-only and receive-encrypted revert (§4.5/§4.6): discards local
//! divergences made under a restricted-write folder mode so the next pull
//! restores the cluster's global state.
//!
//! [`revert_receive_only`] walks every local entry carrying
//! [`fsync_model::LOCAL_FLAG_RECEIVE_ONLY`] and either deletes it (we are
//! the only device that ever had it), adopts the global version silently
//! (our content already matches), or resets its version to empty so the
//! puller treats it as needing a fetch. [`encrypted::revert_receive_encrypted`]
//! is the simpler receive-encrypted sibling: no convergence case, just
//! delete-and-rescan for anything that isn't a recognizable encrypted name.

pub mod encrypted;
mod error;

use fsync_fs::{is_not_exist, Filesystem};
use fsync_fileset::{DeviceId, FileSet};
use fsync_model::{Vector, LOCAL_FLAG_RECEIVE_ONLY};

pub use encrypted::revert_receive_encrypted;
pub use error::RevertError;

/// Directories left behind by a revert pass, leaves-first, that the caller
/// should schedule a rescan for (§4.5 step 3).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RevertOutcome {
    pub rescan_dirs: Vec<String>,
}

/// Runs one receive-only revert pass over `local_device`'s entries (§4.5).
pub fn revert_receive_only(
    fs: &dyn Filesystem,
    file_set: &dyn FileSet,
    local_device: DeviceId,
) -> Result<RevertOutcome, RevertError> {
    let locals = file_set.all_local(local_device);
    let mut dir_queue = Vec::new();
    let mut updates = Vec::new();

    for mut local in locals {
        if !local.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY) {
            continue;
        }
        local.clear_local_flag(LOCAL_FLAG_RECEIVE_ONLY);

        let global = file_set.get_global(&local.name);
        let sole_source = match &global {
            // The global record is only attributable to us: no other
            // device ever had this item, so reverting means deleting it.
            Some(g) => g.version.drop_others(local_device) == g.version,
            None => true,
        };

        if sole_source {
            if local.is_directory() {
                dir_queue.push(local.name.clone());
            } else if let Err(e) = fs.remove(&local.name) {
                if !is_not_exist(&e) {
                    return Err(e.into());
                }
            }
            local.deleted = true;
            local.blocks.clear();
            local.version = Vector::new();
            updates.push(local);
            continue;
        }

        let global = global.expect("sole_source is false only when global is Some");
        if local.same_content(&global) && local.file_type == global.file_type {
            local.version = global.version;
        } else {
            local.version = Vector::new();
        }
        updates.push(local);
    }

    dir_queue.sort();
    dir_queue.reverse();
    let mut rescan_dirs = Vec::new();
    for dir in &dir_queue {
        match fs.remove(dir) {
            Ok(()) => rescan_dirs.push(dir.clone()),
            Err(e) if is_not_exist(&e) => rescan_dirs.push(dir.clone()),
            Err(e) => return Err(e.into()),
        }
    }

    let reverted = updates.len();
    file_set.update(local_device, updates);
    tracing::info!(
        component = "revert",
        reverted,
        rescanned_dirs = rescan_dirs.len(),
        "receive-only revert complete"
    );
    Ok(RevertOutcome { rescan_dirs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fileset::InMemoryFileSet;
    use fsync_fs::MemFilesystem;
    use fsync_ignore::IgnoreMatcher;
    use fsync_model::{BlockInfo, FileInfo, FileType};
    use fsync_scanner::{hash_file_blocks, Scanner};
    use fsync_statetracker::StateTracker;
    use std::io::Write as _;

    const LOCAL: DeviceId = 1;
    const REMOTE: DeviceId = 2;

    fn blocks_for(content: &[u8], block_size: u32) -> Vec<BlockInfo> {
        let probe = MemFilesystem::new();
        probe.open_write("p").unwrap().write_all(content).unwrap();
        hash_file_blocks(&probe, "p", block_size).unwrap()
    }

    fn remote_entry(name: &str, file_type: FileType, blocks: Vec<BlockInfo>, version: Vector) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type,
            size: blocks.iter().map(|b| b.size as u64).sum(),
            permissions: 0o644,
            modified_s: 0,
            modified_ns: 0,
            modified_by: REMOTE,
            deleted: false,
            invalid: false,
            no_permissions: true,
            local_flags: 0,
            version,
            sequence: 1,
            blocks,
            symlink_target: String::new(),
            block_size: Some(128),
        }
    }

    /// S1: RecvOnly Revert Deletes.
    #[tokio::test]
    async fn s1_recv_only_revert_deletes_unknown_items() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("knownDir", 0o755).unwrap();
        fs.open_write("knownDir/knownFile").unwrap().write_all(b"hello\n").unwrap();
        fs.mkdir_all("ignDir", 0o755).unwrap();
        fs.open_write("ignDir/ignFile").unwrap().write_all(b"secret").unwrap();
        fs.mkdir_all("unknownDir", 0o755).unwrap();
        fs.open_write("unknownDir/unknownFile").unwrap().write_all(b"mystery").unwrap();
        fs.open_write(".stignore").unwrap().write_all(b"ignDir\n").unwrap();

        let file_set = InMemoryFileSet::new();

        let mut remote_v = Vector::new();
        remote_v.update(REMOTE);
        file_set.update(
            REMOTE,
            vec![
                remote_entry("knownDir", FileType::Directory, vec![], remote_v.clone()),
                remote_entry(
                    "knownDir/knownFile",
                    FileType::File,
                    blocks_for(b"hello\n", 128),
                    remote_v,
                ),
            ],
        );

        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(LOCAL, 128, true);
        let stats = scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        // First-ever scan: every walked entry is new, so all four count
        // (knownDir, knownDir/knownFile, unknownDir, unknownDir/unknownFile).
        // ignDir/ignFile never gets walked at all.
        assert_eq!(stats.updated, 4);

        assert!(file_set
            .get(LOCAL, "unknownDir/unknownFile")
            .unwrap()
            .has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        assert!(!file_set
            .get(LOCAL, "knownDir/knownFile")
            .unwrap()
            .has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));

        revert_receive_only(&fs, &file_set, LOCAL).unwrap();

        assert!(fs.lstat("unknownDir").is_err());
        assert!(fs.lstat("unknownDir/unknownFile").is_err());
        assert!(fs.lstat("ignDir/ignFile").is_ok());
        assert!(fs.lstat("knownDir/knownFile").is_ok());
    }

    /// S2: RecvOnly Revert Needs.
    #[tokio::test]
    async fn s2_recv_only_revert_resets_version_to_need() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("knownDir", 0o755).unwrap();
        fs.open_write("knownDir/knownFile").unwrap().write_all(b"hello\n").unwrap();

        let file_set = InMemoryFileSet::new();
        let mut remote_v = Vector::new();
        remote_v.update(REMOTE);
        file_set.update(
            REMOTE,
            vec![
                remote_entry("knownDir", FileType::Directory, vec![], remote_v.clone()),
                remote_entry(
                    "knownDir/knownFile",
                    FileType::File,
                    blocks_for(b"hello\n", 128),
                    remote_v,
                ),
            ],
        );

        let mut ignore = IgnoreMatcher::new();
        let state = StateTracker::new("f1");
        let scanner = Scanner::new(LOCAL, 128, true);
        scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        assert!(file_set.need(LOCAL).is_empty());

        // Overwrite locally with different content, rescan: diverges from
        // the already-synced global, so it gets flagged receive-only again.
        fs.open_write("knownDir/knownFile")
            .unwrap()
            .write_all(b"totally different data\n")
            .unwrap();
        let stats = scanner.scan(&fs, &file_set, &mut ignore, &state, &[]).await.unwrap();
        assert_eq!(stats.updated, 1);
        assert!(file_set
            .get(LOCAL, "knownDir/knownFile")
            .unwrap()
            .has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        assert!(file_set.need(LOCAL).is_empty());

        revert_receive_only(&fs, &file_set, LOCAL).unwrap();

        let reverted = file_set.get(LOCAL, "knownDir/knownFile").unwrap();
        assert!(reverted.version.is_empty());
        assert!(!reverted.has_local_flag(LOCAL_FLAG_RECEIVE_ONLY));
        // The local bytes on disk are untouched by a version-only revert;
        // only the next pull (outside this crate) replaces them.
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut fs.open("knownDir/knownFile").unwrap(), &mut buf).unwrap();
        assert_eq!(buf, b"totally different data\n");

        assert_eq!(file_set.need(LOCAL).len(), 1);
    }

    #[test]
    fn sole_source_directory_is_deleted_leaves_first() {
        let fs = MemFilesystem::new();
        fs.mkdir_all("onlyhere/nested", 0o755).unwrap();

        let file_set = InMemoryFileSet::new();
        let mut v = Vector::new();
        v.update(LOCAL);
        let dir = |name: &str| FileInfo {
            name: name.to_string(),
            file_type: FileType::Directory,
            size: 0,
            permissions: 0o755,
            modified_s: 0,
            modified_ns: 0,
            modified_by: LOCAL,
            deleted: false,
            invalid: false,
            no_permissions: false,
            local_flags: LOCAL_FLAG_RECEIVE_ONLY,
            version: v.drop_others(LOCAL),
            sequence: 1,
            blocks: vec![],
            symlink_target: String::new(),
            block_size: None,
        };
        file_set.update(LOCAL, vec![dir("onlyhere"), dir("onlyhere/nested")]);

        let outcome = revert_receive_only(&fs, &file_set, LOCAL).unwrap();
        assert!(fs.lstat("onlyhere").is_err());
        assert_eq!(
            outcome.rescan_dirs,
            vec!["onlyhere/nested".to_string(), "onlyhere".to_string()]
        );
    }
}
