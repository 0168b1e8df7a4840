//! Core data types shared across the folder synchronization engine:
//! [`FileInfo`], [`BlockInfo`], version vectors, folder and puller state.
//!
//! This crate has no I/O and no async; it is pure data plus the handful of
//! pure functions (`block_diff`, `in_conflict`) that every other crate in the
//! workspace builds on.

mod batch;
mod block;
mod file_info;
mod state;
mod vector;

pub use batch::{estimated_wire_size, FileInfoBatch};
pub use block::{block_diff, BlockDiff, BlockInfo, StrongHash};
pub use file_info::{
    in_conflict, FileInfo, FileType, LOCAL_FLAG_MUST_RESCAN, LOCAL_FLAG_RECEIVE_ONLY,
};
pub use state::{FolderState, PullerState};
pub use vector::{ShortId, Vector};
