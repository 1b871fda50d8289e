use std::io;
use std::num;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameDatError>;

#[derive(Error, Debug)]
pub enum GameDatError {
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("int conversion error: {0}")]
    TryFromIntError(#[from] num::TryFromIntError),
    #[error("not a GAMEDAT PAC archive")]
    FormatMismatch,
    #[error("corrupt archive directory: {0}")]
    CorruptDirectory(String),
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u8),
    #[error("failed to find file entry")]
    EntryNotFound,
    #[error("invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },
    #[error("file size limit exceeded: {0}")]
    FileSizeLimit(String),
    #[error("operation aborted")]
    Aborted,
}

impl GameDatError {
    pub fn corrupt_directory(msg: impl Into<String>) -> Self {
        Self::CorruptDirectory(msg.into())
    }

    pub fn invalid_file_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFileName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn file_size_limit(msg: impl Into<String>) -> Self {
        Self::FileSizeLimit(msg.into())
    }
}
