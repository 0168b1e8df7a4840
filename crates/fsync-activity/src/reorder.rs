use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderStrategy {
    InOrder,
    Random,
    /// Default. Splits blocks into per-device chunks, emits self's chunk
    /// first, then a uniform shuffle of the rest.
    Standard,
}

/// Reorders `blocks` according to `strategy`. `device_ids` is the full set
/// of devices sharing the folder; `self_id` must be one of them for
/// `Standard` to emit a meaningful first chunk (falls back to chunk 0
/// otherwise).
///
/// Preserves the multiset of blocks under every strategy (§8 property 4).
pub fn reorder<T: Clone, D: Ord + Clone>(
    strategy: ReorderStrategy,
    blocks: Vec<T>,
    device_ids: &[D],
    self_id: &D,
) -> Vec<T> {
    match strategy {
        ReorderStrategy::InOrder => blocks,
        ReorderStrategy::Random => {
            let mut blocks = blocks;
            blocks.shuffle(&mut rand::thread_rng());
            blocks
        }
        ReorderStrategy::Standard => standard_reorder(blocks, device_ids, self_id),
    }
}

fn standard_reorder<T: Clone, D: Ord + Clone>(
    blocks: Vec<T>,
    device_ids: &[D],
    self_id: &D,
) -> Vec<T> {
    if blocks.is_empty() || device_ids.is_empty() {
        return blocks;
    }
    let mut ids: Vec<&D> = device_ids.iter().collect();
    ids.sort();
    let n = ids.len();
    let self_index = ids.iter().position(|id| *id == self_id).unwrap_or(0);

    let chunk_size = (blocks.len() + n - 1) / n;
    let chunks: Vec<Vec<T>> = blocks.chunks(chunk_size.max(1)).map(|c| c.to_vec()).collect();

    let mut result = Vec::with_capacity(blocks.len());
    if let Some(first) = chunks.get(self_index) {
        result.extend(first.iter().cloned());
    }
    let mut rest: Vec<usize> = (0..chunks.len()).filter(|&i| i != self_index).collect();
    rest.shuffle(&mut rand::thread_rng());
    for i in rest {
        result.extend(chunks[i].iter().cloned());
    }
    result
}
