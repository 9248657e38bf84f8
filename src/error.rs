use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BcfError {
    #[error("at least one BCF path is required to perform a merge")]
    NoInputs,
    #[error("failed to read BCF archive {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(String),
}

pub type BcfResult<T> = Result<T, BcfError>;
