use serde::{Deserialize, Serialize};

/// Strong content hash of a block. Opaque outside this crate; callers treat
/// it as an identity, not a hash algorithm choice.
pub type StrongHash = [u8; 32];

/// Fixed-size (or power-of-two scaled) segment of a file.
///
/// Blocks within a file are indexed `0..n`, and `offset[i] = sum(size[0..i])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub offset: u64,
    pub size: u32,
    pub hash: StrongHash,
    pub weak_hash: Option<u32>,
}

impl BlockInfo {
    /// A block is "empty" if its content is all zeroes, identified purely by
    /// its strong hash (the hash of `size` zero bytes).
    pub fn is_empty_block(&self, empty_hash_for_size: impl Fn(u32) -> StrongHash) -> bool {
        self.hash == empty_hash_for_size(self.size)
    }
}

/// Result of diffing a target's block list against a source (local "have")
/// block list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockDiff {
    /// Target indices already satisfied by the source at the same index.
    pub have: Vec<usize>,
    /// Target indices that must be (re)copied or fetched.
    pub need: Vec<usize>,
}

/// Compares `src` (what we currently hold) against `tgt` (what the target
/// file must contain) index by index. If `tgt` is longer, the tail is
/// needed. At any position where the hashes differ, that block is needed.
///
/// Testable property: `have ⊎ need = 0..tgt.len()`, and for every index in
/// `have` the source block at that index carries the same hash as the
/// target block.
pub fn block_diff(src: &[BlockInfo], tgt: &[BlockInfo]) -> BlockDiff {
    let mut diff = BlockDiff::default();
    for (i, t) in tgt.iter().enumerate() {
        match src.get(i) {
            Some(s) if s.hash == t.hash => diff.have.push(i),
            _ => diff.need.push(i),
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(i: u8, size: u32) -> BlockInfo {
        let mut hash = [0u8; 32];
        hash[0] = i;
        BlockInfo {
            offset: 0,
            size,
            hash,
            weak_hash: None,
        }
    }

    #[test]
    fn block_diff_empty_inputs() {
        let d = block_diff(&[], &[]);
        assert!(d.have.is_empty());
        assert!(d.need.is_empty());
    }

    #[test]
    fn block_diff_all_needed_when_src_empty() {
        let tgt = vec![block(1, 10), block(2, 10)];
        let d = block_diff(&[], &tgt);
        assert!(d.have.is_empty());
        assert_eq!(d.need, vec![0, 1]);
    }

    #[test]
    fn block_diff_matches_by_index() {
        let src = vec![block(1, 10), block(9, 10), block(3, 10)];
        let tgt = vec![block(1, 10), block(2, 10), block(3, 10)];
        let d = block_diff(&src, &tgt);
        assert_eq!(d.have, vec![0, 2]);
        assert_eq!(d.need, vec![1]);
    }

    #[test]
    fn block_diff_tail_needed_when_target_longer() {
        let src = vec![block(1, 10)];
        let tgt = vec![block(1, 10), block(2, 10), block(3, 10)];
        let d = block_diff(&src, &tgt);
        assert_eq!(d.have, vec![0]);
        assert_eq!(d.need, vec![1, 2]);
    }

    #[test]
    fn have_and_need_partition_target_indices() {
        let src = vec![block(1, 10), block(2, 10)];
        let tgt = vec![block(1, 10), block(9, 10), block(3, 10), block(4, 10)];
        let d = block_diff(&src, &tgt);
        let mut all: Vec<usize> = d.have.iter().chain(d.need.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }
}
