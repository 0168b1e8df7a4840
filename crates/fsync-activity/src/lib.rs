//! Device activity counters and the block-pull reordering policy (§4.4).

mod activity;
mod reorder;

pub use activity::DeviceActivity;
pub use reorder::{reorder, ReorderStrategy};
