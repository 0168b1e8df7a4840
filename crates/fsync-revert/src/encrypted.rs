//! Receive-encrypted revert (§4.6): same shape as receive-only revert but
//! simpler — there is no "equivalent to global" convergence case, since an
//! encrypted folder never decides content equivalence locally. Anything
//! that isn't a recognizable encrypted-path name is unknown and goes.

use fsync_fs::{is_not_exist, Filesystem};
use fsync_fileset::{DeviceId, FileSet};
use fsync_model::Vector;

use crate::error::RevertError;
use crate::RevertOutcome;

/// Deletes every local item whose name `is_encrypted_name` rejects, then
/// removes the directories left behind leaves-first. `is_encrypted_name` is
/// the caller's judgment of "this name came from the encrypted naming
/// scheme" — that scheme is the transport's concern (spec Non-goal:
/// encryption), so it is passed in rather than reimplemented here.
pub fn revert_receive_encrypted(
    fs: &dyn Filesystem,
    file_set: &dyn FileSet,
    local_device: DeviceId,
    is_encrypted_name: impl Fn(&str) -> bool,
) -> Result<RevertOutcome, RevertError> {
    let locals = file_set.all_local(local_device);
    let mut dir_queue = Vec::new();
    let mut updates = Vec::new();

    for mut local in locals {
        if local.deleted || is_encrypted_name(&local.name) {
            continue;
        }

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

    let deleted = updates.len();
    file_set.update(local_device, updates);
    tracing::info!(
        component = "revert",
        deleted,
        rescanned_dirs = rescan_dirs.len(),
        "receive-encrypted revert complete"
    );
    Ok(RevertOutcome { rescan_dirs })
}
