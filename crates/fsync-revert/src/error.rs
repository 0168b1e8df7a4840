use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevertError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
