use thiserror::Error;

#[derive(Debug, Error)]
pub enum PullFileError {
    #[error("symlink source has no target")]
    IncompatibleSymlink,
    #[error("not enough free disk space for {name}")]
    NoSpace { name: String },
    #[error("no device offers block {index} of {name}")]
    NoDevice { name: String, index: usize },
    #[error("directory {0} is not empty")]
    DirNotEmpty(String),
    #[error("directory {0} has ignored (non-deletable) children")]
    DirHasIgnored(String),
    #[error("directory {0} has unscanned children, rescan scheduled")]
    DirHasToBeScanned(String),
    #[error("{0} was modified locally since scanning, rescan scheduled")]
    ModifiedNotRescanned(String),
    #[error("symlinks are not supported on this platform")]
    SymlinkUnsupported,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
