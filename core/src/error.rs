use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuetiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Short read on {path}: expected {expected} bytes at offset {offset}, got {actual}")]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Short write on {path}: {expected} bytes at offset {offset} do not fit in {capacity} bytes")]
    ShortWrite {
        path: PathBuf,
        offset: u64,
        expected: usize,
        capacity: u64,
    },

    #[error("Unknown filesystem on {0}. Continuing will destroy your data. Exiting")]
    UnsupportedFilesystem(PathBuf),

    #[error("Invalid boot region: {0}")]
    InvalidBootRegion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl DuetiError {
    /// Short transfers are reported separately but count as I/O failures.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            DuetiError::IoError(_) | DuetiError::ShortRead { .. } | DuetiError::ShortWrite { .. }
        )
    }
}
