use crate::file_info::FileInfo;

/// Rough estimate of a `FileInfo`'s wire size: name bytes plus a fixed
/// per-block cost (32-byte strong hash + 8-byte offset + 4-byte size),
/// used purely to size batches, not to predict actual bytes on the wire.
pub fn estimated_wire_size(file: &FileInfo) -> u64 {
    file.name.len() as u64 + file.blocks.len() as u64 * 44
}

/// Buffers `FileInfo` records until either threshold is hit, then flushes
/// via a caller-supplied sink (§4.9). Used both by the scanner (1000 items
/// / 256 MiB of block data) and the pull pipeline's db updater (1000 items,
/// with its own 2s timer layered on top by the caller).
pub struct FileInfoBatch {
    items: Vec<FileInfo>,
    max_items: usize,
    max_bytes: u64,
    current_bytes: u64,
}

impl FileInfoBatch {
    pub fn new(max_items: usize, max_bytes: u64) -> Self {
        Self {
            items: Vec::new(),
            max_items,
            max_bytes,
            current_bytes: 0,
        }
    }

    pub fn push(&mut self, item: FileInfo) {
        self.current_bytes += estimated_wire_size(&item);
        self.items.push(item);
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_items || self.current_bytes >= self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flushes only if full; returns whether it did. Idempotent on an empty
    /// batch regardless of thresholds.
    pub fn flush_if_full(&mut self, sink: impl FnOnce(Vec<FileInfo>)) -> bool {
        if self.items.is_empty() || !self.is_full() {
            return false;
        }
        self.flush(sink);
        true
    }

    pub fn flush(&mut self, sink: impl FnOnce(Vec<FileInfo>)) {
        if self.items.is_empty() {
            return;
        }
        let items = std::mem::take(&mut self.items);
        self.current_bytes = 0;
        sink(items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_info::FileType;
    use crate::vector::Vector;

    fn file(name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            file_type: FileType::File,
            size: 0,
            permissions: 0,
            modified_s: 0,
            modified_ns: 0,
            modified_by: 0,
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
    fn flush_if_full_noop_below_threshold() {
        let mut batch = FileInfoBatch::new(10, 1_000_000);
        batch.push(file("a"));
        let mut flushed = false;
        assert!(!batch.flush_if_full(|_| flushed = true));
        assert!(!flushed);
    }

    #[test]
    fn flush_if_full_flushes_at_item_threshold() {
        let mut batch = FileInfoBatch::new(2, 1_000_000);
        batch.push(file("a"));
        batch.push(file("b"));
        let mut got = Vec::new();
        assert!(batch.flush_if_full(|items| got = items));
        assert_eq!(got.len(), 2);
        assert!(batch.is_empty());
    }

    #[test]
    fn flush_on_empty_batch_is_idempotent() {
        let mut batch = FileInfoBatch::new(10, 1_000_000);
        let mut called = false;
        batch.flush(|_| called = true);
        assert!(!called);
    }
}
