use std::collections::HashMap;

use fsync_activity::DeviceActivity;
use fsync_fileset::DeviceId;
use fsync_fs::Filesystem;
use fsync_model::{block_diff, BlockInfo, StrongHash};
use fsync_progress::DownloadProgress;
use fsync_scanner::{hash_file_blocks, weak_hash, RollingWeakHash};
use fsync_semaphore::ByteSemaphore;
use rand::seq::SliceRandom;

use crate::block_source::BlockSource;
use crate::error::PullFileError;

/// Result of diffing target blocks against local have-blocks, then further
/// reducing by whatever a leftover temp file already holds (§4.3.6 steps
/// 1-2).
pub struct PullPlan {
    /// Target indices still to be satisfied by copy or remote pull.
    pub needed: Vec<usize>,
    /// Target indices already present and verified in the temp file.
    pub reused: Vec<usize>,
}

/// Builds the pull plan for one file: block_diff against `local_blocks`,
/// then temp-file block reuse (§4.3.6 steps 1-2). If no blocks are
/// reusable, the temp file is removed so the writer can create it fresh.
pub fn plan_pull(
    fs: &dyn Filesystem,
    temp_name: &str,
    local_blocks: &[BlockInfo],
    target_blocks: &[BlockInfo],
) -> std::io::Result<PullPlan> {
    let diff = block_diff(local_blocks, target_blocks);
    let mut needed = diff.need;

    let existing = match hash_file_blocks_at(fs, temp_name, target_blocks) {
        Ok(blocks) => blocks,
        Err(_) => Vec::new(),
    };

    let mut reused = Vec::new();
    if !existing.is_empty() {
        for &idx in &needed {
            if let Some(found) = existing.get(idx) {
                if found.hash == target_blocks[idx].hash {
                    reused.push(idx);
                }
            }
        }
        needed.retain(|idx| !reused.contains(idx));
    }

    if reused.is_empty() {
        let _ = fs.remove(temp_name);
    }

    Ok(PullPlan { needed, reused })
}

/// Hashes the temp file using the target's per-block sizes (the temp file's
/// trailing block may be short if the pull was interrupted mid-block).
fn hash_file_blocks_at(
    fs: &dyn Filesystem,
    name: &str,
    target_blocks: &[BlockInfo],
) -> std::io::Result<Vec<BlockInfo>> {
    let block_size = target_blocks.first().map(|b| b.size).unwrap_or(0);
    if block_size == 0 {
        return Ok(Vec::new());
    }
    hash_file_blocks(fs, name, block_size)
}

/// Disk-space guard (§4.3.6 step 3): fails with `NoSpace` if the target
/// filesystem reports less free space than `bytes_needed`.
pub fn check_disk_space(
    fs: &dyn Filesystem,
    name: &str,
    min_disk_free: u64,
    bytes_needed: u64,
) -> Result<(), PullFileError> {
    if min_disk_free == 0 {
        return Ok(());
    }
    let usage = fs.usage(name)?;
    if usage.free < bytes_needed {
        return Err(PullFileError::NoSpace {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Shuffles the block fetch order so concurrent peers don't collide on the
/// same ranges (§4.3.6 step 4).
pub fn shuffle_blocks(mut indices: Vec<usize>) -> Vec<usize> {
    indices.shuffle(&mut rand::thread_rng());
    indices
}

/// Outcome of a single copier attempt at one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Satisfied locally: the empty-block sparse shortcut, or a local/
    /// global strong-hash match at the same offset.
    CopiedFromOrigin,
    /// Satisfied locally via the weak-hash Finder at a shifted offset.
    CopiedFromOriginShifted,
    /// No local source found; must be dispatched to a pull worker.
    NeedsPull,
}

/// A block-lookup collaborator over all folders' current content, keyed by
/// strong hash (§4.3.6 copier step "global block-finder").
pub trait GlobalBlockFinder: Send + Sync {
    fn find(&self, hash: &StrongHash) -> Option<(String, String, usize)>;
}

/// A `GlobalBlockFinder` with nothing registered; every lookup misses.
pub struct EmptyBlockFinder;

impl GlobalBlockFinder for EmptyBlockFinder {
    fn find(&self, _hash: &StrongHash) -> Option<(String, String, usize)> {
        None
    }
}

/// Builds a weak-hash → byte-offset index over `name`'s current content,
/// used to locate a needed block's bytes at a shifted position (§4.3.6).
fn build_weak_hash_index(fs: &dyn Filesystem, name: &str, window: usize) -> HashMap<u32, Vec<u64>> {
    let mut index: HashMap<u32, Vec<u64>> = HashMap::new();
    let Ok(mut reader) = fs.open(name) else {
        return index;
    };
    let mut data = Vec::new();
    if std::io::Read::read_to_end(&mut reader, &mut data).is_err() {
        return index;
    }
    if data.len() < window || window == 0 {
        return index;
    }
    let mut rolling = RollingWeakHash::new(&data[0..window]);
    index.entry(rolling.value()).or_default().push(0);
    for offset in 1..=(data.len() - window) {
        rolling.roll(data[offset - 1], data[offset + window - 1]);
        index.entry(rolling.value()).or_default().push(offset as u64);
    }
    index
}

/// Attempts to satisfy `target_block` without a remote fetch: the sparse
/// empty-block shortcut, weak-hash shifted lookup, or a global strong-hash
/// finder, writing the bytes to `temp_name` on success (§4.3.6 copier).
pub fn copy_block(
    fs: &dyn Filesystem,
    temp_name: &str,
    local_name: &str,
    target_block: &BlockInfo,
    sparse_files: bool,
    weak_hash_index: Option<&HashMap<u32, Vec<u64>>>,
    global_finder: &dyn GlobalBlockFinder,
    empty_hash: StrongHash,
) -> std::io::Result<CopyOutcome> {
    if sparse_files && target_block.hash == empty_hash {
        return Ok(CopyOutcome::CopiedFromOrigin);
    }

    if let (Some(weak), Some(index)) = (target_block.weak_hash, weak_hash_index) {
        if let Some(offsets) = index.get(&weak) {
            for &offset in offsets {
                if let Some(bytes) = read_at(fs, local_name, offset, target_block.size)? {
                    if *blake3::hash(&bytes).as_bytes() == target_block.hash {
                        fs.write_at(temp_name, target_block.offset, &bytes)?;
                        return Ok(CopyOutcome::CopiedFromOriginShifted);
                    }
                }
            }
        }
    }

    if let Some((folder, path, index)) = global_finder.find(&target_block.hash) {
        let offset = index as u64 * target_block.size as u64;
        if let Some(bytes) = read_at(fs, &path, offset, target_block.size)? {
            if *blake3::hash(&bytes).as_bytes() == target_block.hash {
                fs.write_at(temp_name, target_block.offset, &bytes)?;
                let _ = folder;
                return Ok(CopyOutcome::CopiedFromOrigin);
            }
        }
    }

    Ok(CopyOutcome::NeedsPull)
}

fn read_at(fs: &dyn Filesystem, name: &str, offset: u64, size: u32) -> std::io::Result<Option<Vec<u8>>> {
    let mut reader = match fs.open(name) {
        Ok(r) => r,
        Err(_) => return Ok(None),
    };
    let mut skip = vec![0u8; offset as usize];
    if offset > 0 && std::io::Read::read_exact(&mut reader, &mut skip).is_err() {
        return Ok(None);
    }
    let mut buf = vec![0u8; size as usize];
    if std::io::Read::read_exact(&mut reader, &mut buf).is_err() {
        return Ok(None);
    }
    Ok(Some(buf))
}

pub fn weak_hash_index_for(fs: &dyn Filesystem, name: &str, block_size: u32) -> HashMap<u32, Vec<u64>> {
    build_weak_hash_index(fs, name, block_size as usize)
}

/// One availability candidate for a pull-worker block fetch.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub device: DeviceId,
    pub from_temporary: bool,
}

/// Enumerates candidates for `block_index` of `(folder, name)`: devices
/// whose index offers the file, plus devices whose download-progress
/// tracker reports the block as in-flight in their temp file (§4.3.6 step
/// 1 of the pull worker).
pub fn block_candidates(
    offering: &[DeviceId],
    progress: &DownloadProgress<DeviceId>,
    folder: &str,
    name: &str,
    version: &fsync_model::Vector,
    block_index: usize,
    all_known_devices: &[DeviceId],
) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = offering
        .iter()
        .map(|&device| Candidate {
            device,
            from_temporary: false,
        })
        .collect();
    for &device in all_known_devices {
        if offering.contains(&device) {
            continue;
        }
        if progress.has(&device, folder, name, version, block_index) {
            out.push(Candidate {
                device,
                from_temporary: true,
            });
        }
    }
    out
}

/// Fetches one block from the least-busy candidate, verifying its strong
/// hash and writing it into the temp file (§4.3.6 pull worker steps 2-6).
/// Tries the next candidate on a hash mismatch or transport error.
pub async fn pull_block(
    fs: &dyn Filesystem,
    source: &dyn BlockSource,
    activity: &DeviceActivity<DeviceId>,
    semaphore: &ByteSemaphore,
    candidates: &[Candidate],
    folder: &str,
    name: &str,
    temp_name: &str,
    block: &BlockInfo,
) -> Result<(), PullFileError> {
    if candidates.is_empty() {
        return Err(PullFileError::NoDevice {
            name: name.to_string(),
            index: (block.offset / block.size.max(1) as u64) as usize,
        });
    }

    semaphore.take(block.size as u64).await;
    let result = pull_block_inner(fs, source, activity, candidates, folder, name, temp_name, block).await;
    semaphore.give(block.size as u64);
    result
}

async fn pull_block_inner(
    fs: &dyn Filesystem,
    source: &dyn BlockSource,
    activity: &DeviceActivity<DeviceId>,
    candidates: &[Candidate],
    folder: &str,
    name: &str,
    temp_name: &str,
    block: &BlockInfo,
) -> Result<(), PullFileError> {
    let mut remaining: Vec<DeviceId> = candidates.iter().map(|c| c.device).collect();
    let mut last_err: Option<std::io::Error> = None;

    while !remaining.is_empty() {
        let Some(&device) = activity.least_busy(&remaining) else {
            break;
        };
        activity.using(&device);
        let fetched = source
            .read_block(device, folder, name, block.offset, block.size, block.hash)
            .await;
        activity.done(&device);

        match fetched {
            Ok(bytes) if *blake3::hash(&bytes).as_bytes() == block.hash => {
                fs.write_at(temp_name, block.offset, &bytes)?;
                return Ok(());
            }
            Ok(_) => {
                remaining.retain(|&d| d != device);
            }
            Err(e) => {
                last_err = Some(e);
                remaining.retain(|&d| d != device);
            }
        }
    }

    match last_err {
        Some(e) => Err(PullFileError::Io(e)),
        None => Err(PullFileError::NoDevice {
            name: name.to_string(),
            index: (block.offset / block.size.max(1) as u64) as usize,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use std::io::Write as _;

    fn block(offset: u64, size: u32, data: &[u8]) -> BlockInfo {
        BlockInfo {
            offset,
            size,
            hash: *blake3::hash(data).as_bytes(),
            weak_hash: Some(weak_hash(data)),
        }
    }

    #[test]
    fn plan_pull_reuses_matching_temp_blocks() {
        let fs = MemFilesystem::new();
        let target = vec![block(0, 4, b"abcd"), block(4, 4, b"efgh")];
        fs.open_write("t").unwrap().write_all(b"abcdXXXX").unwrap();
        let plan = plan_pull(&fs, "t", &[], &target).unwrap();
        assert_eq!(plan.reused, vec![0]);
        assert_eq!(plan.needed, vec![1]);
    }

    #[test]
    fn plan_pull_removes_temp_when_nothing_reusable() {
        let fs = MemFilesystem::new();
        let target = vec![block(0, 4, b"abcd")];
        fs.open_write("t").unwrap().write_all(b"ZZZZ").unwrap();
        let plan = plan_pull(&fs, "t", &[], &target).unwrap();
        assert!(plan.reused.is_empty());
        assert_eq!(plan.needed, vec![0]);
        assert!(fs.lstat("t").is_err());
    }

    #[test]
    fn shuffle_blocks_preserves_multiset() {
        let indices: Vec<usize> = (0..20).collect();
        let mut shuffled = shuffle_blocks(indices.clone());
        shuffled.sort_unstable();
        assert_eq!(shuffled, indices);
    }

    #[test]
    fn check_disk_space_fails_when_insufficient() {
        let fs = MemFilesystem::new();
        let err = check_disk_space(&fs, "x", 1, u64::MAX).unwrap_err();
        assert!(matches!(err, PullFileError::NoSpace { .. }));
    }

    #[test]
    fn copy_block_sparse_empty_block_is_copied_from_origin() {
        let fs = MemFilesystem::new();
        let empty = empty_block_hash_for_test(4);
        let target = BlockInfo {
            offset: 0,
            size: 4,
            hash: empty,
            weak_hash: None,
        };
        let outcome = copy_block(&fs, "t", "local", &target, true, None, &EmptyBlockFinder, empty).unwrap();
        assert_eq!(outcome, CopyOutcome::CopiedFromOrigin);
    }

    fn empty_block_hash_for_test(size: u32) -> StrongHash {
        *blake3::hash(&vec![0u8; size as usize]).as_bytes()
    }

    #[test]
    fn copy_block_finds_shifted_content_via_weak_hash() {
        let fs = MemFilesystem::new();
        fs.open_write("local").unwrap().write_all(b"XXabcdYY").unwrap();
        let target = block(100, 4, b"abcd");
        let index = weak_hash_index_for(&fs, "local", 4);
        let outcome = copy_block(
            &fs,
            "t",
            "local",
            &target,
            false,
            Some(&index),
            &EmptyBlockFinder,
            [0u8; 32],
        )
        .unwrap();
        assert_eq!(outcome, CopyOutcome::CopiedFromOriginShifted);
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut fs.open("t").unwrap(), &mut buf).unwrap();
        assert_eq!(&buf[100..104], b"abcd");
    }

    #[test]
    fn copy_block_falls_back_to_needs_pull() {
        let fs = MemFilesystem::new();
        let target = block(0, 4, b"abcd");
        let outcome = copy_block(&fs, "t", "local", &target, false, None, &EmptyBlockFinder, [0u8; 32]).unwrap();
        assert_eq!(outcome, CopyOutcome::NeedsPull);
    }

    struct FakeSource {
        data: HashMap<(DeviceId, String), Vec<u8>>,
    }

    #[async_trait::async_trait]
    impl BlockSource for FakeSource {
        async fn read_block(
            &self,
            device: DeviceId,
            _folder: &str,
            name: &str,
            _offset: u64,
            _size: u32,
            _strong_hash: StrongHash,
        ) -> std::io::Result<Vec<u8>> {
            self.data
                .get(&(device, name.to_string()))
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no block"))
        }
    }

    #[tokio::test]
    async fn pull_block_writes_verified_bytes() {
        let fs = MemFilesystem::new();
        let activity: DeviceActivity<DeviceId> = DeviceActivity::new();
        let semaphore = ByteSemaphore::new(1024);
        let target = block(0, 4, b"abcd");
        let mut data = HashMap::new();
        data.insert((1u32, "f.txt".to_string()), b"abcd".to_vec());
        let source = FakeSource { data };
        let candidates = vec![Candidate {
            device: 1,
            from_temporary: false,
        }];
        pull_block(&fs, &source, &activity, &semaphore, &candidates, "folder", "f.txt", "t", &target)
            .await
            .unwrap();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut fs.open("t").unwrap(), &mut buf).unwrap();
        assert_eq!(buf, b"abcd");
    }

    #[tokio::test]
    async fn pull_block_tries_next_candidate_on_hash_mismatch() {
        let fs = MemFilesystem::new();
        let activity: DeviceActivity<DeviceId> = DeviceActivity::new();
        let semaphore = ByteSemaphore::new(1024);
        let target = block(0, 4, b"abcd");
        let mut data = HashMap::new();
        data.insert((1u32, "f.txt".to_string()), b"WRONG".to_vec());
        data.insert((2u32, "f.txt".to_string()), b"abcd".to_vec());
        let source = FakeSource { data };
        let candidates = vec![
            Candidate { device: 1, from_temporary: false },
            Candidate { device: 2, from_temporary: false },
        ];
        pull_block(&fs, &source, &activity, &semaphore, &candidates, "folder", "f.txt", "t", &target)
            .await
            .unwrap();
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut fs.open("t").unwrap(), &mut buf).unwrap();
        assert_eq!(buf, b"abcd");
    }

    #[tokio::test]
    async fn pull_block_fails_with_no_device_when_candidates_empty() {
        let fs = MemFilesystem::new();
        let activity: DeviceActivity<DeviceId> = DeviceActivity::new();
        let semaphore = ByteSemaphore::new(1024);
        let target = block(0, 4, b"abcd");
        let source = FakeSource { data: HashMap::new() };
        let err = pull_block(&fs, &source, &activity, &semaphore, &[], "folder", "f.txt", "t", &target)
            .await
            .unwrap_err();
        assert!(matches!(err, PullFileError::NoDevice { .. }));
    }
}
