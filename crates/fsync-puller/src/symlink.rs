use fsync_fs::Filesystem;
use fsync_model::FileInfo;

use crate::error::PullFileError;

/// Materializes a symlink from `info` (§4.3.4). Fails with
/// `IncompatibleSymlink` if the source carries no target. Any existing
/// entry at the name is replaced.
pub fn apply_symlink(fs: &dyn Filesystem, info: &FileInfo) -> Result<(), PullFileError> {
    if info.symlink_target.is_empty() {
        return Err(PullFileError::IncompatibleSymlink);
    }
    if fs.lstat(&info.name).is_ok() {
        fs.remove(&info.name)?;
    }
    fs.create_symlink(&info.symlink_target, &info.name)?;
    Ok(())
}
