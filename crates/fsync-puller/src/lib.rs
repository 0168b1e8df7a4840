//! Pull pipeline: need-set enumeration, queue ordering, direct handlers
//! (directory/symlink/shortcut), the copier/puller split, the finisher,
//! conflict policy, and the db updater (§4.3).
//!
//! [`pipeline::PullPipeline::run_iteration`] is the entry point other
//! crates drive; everything else here is a stage in that pipeline, kept
//! independently testable against the `Filesystem`/`FileSet` boundaries.

mod block_source;
mod conflict;
mod copy_pull;
mod db_updater;
mod directory;
mod error;
mod finisher;
mod need_set;
mod order;
mod pipeline;
mod shortcut;
mod symlink;

pub use block_source::BlockSource;
pub use conflict::{conflict_glob, conflict_name, is_conflict_copy, resolve as resolve_conflict};
pub use copy_pull::{
    block_candidates, check_disk_space, copy_block, plan_pull, pull_block, shuffle_blocks,
    weak_hash_index_for, Candidate, CopyOutcome, EmptyBlockFinder, GlobalBlockFinder, PullPlan,
};
pub use directory::{apply_directory, classify_child, delete_directory, ChildKind};
pub use error::PullFileError;
pub use finisher::{perform_finish, FinishOutcome};
pub use need_set::{enumerate, find_rename_candidate, path_is_valid, NeedSet};
pub use order::PullOrder;
pub use pipeline::{PullConfig, PullOutcome, PullPipeline, MAX_ITER};
pub use shortcut::apply_shortcut;
pub use symlink::apply_symlink;
