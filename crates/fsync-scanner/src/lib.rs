//! Filesystem walk + diff against the index, plus compensation scanning and
//! watch bridging (§4.2).
//!
//! [`Scanner::scan`] is the entry point; everything else here supports it:
//! subpath normalization (`unify`), block hashing (`hashing`), the recursive
//! walk (`walk`), the mtime-delta fallback (`compensation`), and reducing a
//! burst of filesystem-watch events into a set of subpaths (`watch_driver`).

mod compensation;
mod error;
mod hashing;
mod scanner;
mod unify;
mod walk;
mod watch_driver;

pub use compensation::CompensationScanner;
pub use error::ScanError;
pub use hashing::{empty_block_hash, hash_file_blocks, weak_hash, RollingWeakHash};
pub use scanner::{ScanStats, Scanner};
pub use unify::unify_subs;
pub use walk::{walk, WalkEntry};
pub use watch_driver::{drain_pending, wait_for_batch};
