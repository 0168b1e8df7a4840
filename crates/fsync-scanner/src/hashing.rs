use std::io::{self, Read};

use fsync_fs::Filesystem;
use fsync_model::BlockInfo;

/// Reads `name` through `fs` and splits it into fixed-size blocks, hashing
/// each with blake3. The strong hash is the canonical block identity (§3).
pub fn hash_file_blocks(
    fs: &dyn Filesystem,
    name: &str,
    block_size: u32,
) -> io::Result<Vec<BlockInfo>> {
    let mut reader = fs.open(name)?;
    let mut blocks = Vec::new();
    let mut offset: u64 = 0;
    let mut buf = vec![0u8; block_size as usize];
    loop {
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        let hash = *blake3::hash(&buf[..filled]).as_bytes();
        blocks.push(BlockInfo {
            offset,
            size: filled as u32,
            hash,
            weak_hash: Some(weak_hash(&buf[..filled])),
        });
        offset += filled as u64;
        if filled < buf.len() {
            break;
        }
    }
    Ok(blocks)
}

/// Strong hash of a block of all-zero bytes at `size`, the canonical
/// identity of an "empty block" (§3).
pub fn empty_block_hash(size: u32) -> [u8; 32] {
    let zeroes = vec![0u8; size as usize];
    *blake3::hash(&zeroes).as_bytes()
}

/// Fast rolling (Adler-32-style) hash used by the copier's weak-hash Finder
/// to locate shifted content within a file (§4.3.6, glossary "weak hash").
pub fn weak_hash(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in data {
        a = (a + byte as u32) % MOD_ADLER;
        b = (b + a) % MOD_ADLER;
    }
    (b << 16) | a
}

/// Recomputes a rolling hash incrementally as a one-byte window slides
/// forward, without rehashing the whole block.
pub struct RollingWeakHash {
    a: u32,
    b: u32,
    window_len: u32,
}

const MOD_ADLER: u32 = 65521;

impl RollingWeakHash {
    pub fn new(initial: &[u8]) -> Self {
        let mut a: u32 = 1;
        let mut b: u32 = 0;
        for &byte in initial {
            a = (a + byte as u32) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }
        Self {
            a,
            b,
            window_len: initial.len() as u32,
        }
    }

    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Slides the window forward by one byte: `old` leaves, `new` enters.
    pub fn roll(&mut self, old: u8, new: u8) {
        self.a = (self.a + MOD_ADLER - old as u32 % MOD_ADLER + new as u32) % MOD_ADLER;
        self.b = (self.b + MOD_ADLER
            - (self.window_len * old as u32) % MOD_ADLER
            - 1
            + self.a)
            % MOD_ADLER;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsync_fs::MemFilesystem;
    use std::io::Write as _;

    #[test]
    fn hash_file_blocks_splits_by_size() {
        let fs = MemFilesystem::new();
        fs.open_write("a").unwrap().write_all(&[1u8; 10]).unwrap();
        let blocks = hash_file_blocks(&fs, "a", 4).unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].offset, 0);
        assert_eq!(blocks[1].offset, 4);
        assert_eq!(blocks[2].offset, 8);
        assert_eq!(blocks[2].size, 2);
    }

    #[test]
    fn empty_block_hash_matches_zero_hash_of_file() {
        let fs = MemFilesystem::new();
        fs.open_write("z").unwrap().write_all(&[0u8; 8]).unwrap();
        let blocks = hash_file_blocks(&fs, "z", 8).unwrap();
        assert_eq!(blocks[0].hash, empty_block_hash(8));
    }

    #[test]
    fn weak_hash_matches_rolling_hash_initial_value() {
        let data = b"hello world";
        let direct = weak_hash(data);
        let rolling = RollingWeakHash::new(data);
        assert_eq!(direct, rolling.value());
    }

    #[test]
    fn weak_hash_differs_for_different_content() {
        assert_ne!(weak_hash(b"aaaa"), weak_hash(b"bbbb"));
    }
}
