use std::io;

use thiserror::Error;

pub type WordbreakResult<T> = std::result::Result<T, WordbreakError>;

#[derive(Error, Debug)]
pub enum WordbreakError {
    #[error("Unsupported hash type: {0:?}")]
    UnsupportedHashType(String),

    #[error("No wordlist loaded under the name {0:?}")]
    WordlistNotFound(String),

    #[error("A search job is already running")]
    AlreadyRunning,

    #[error("Failed to compute the {hash_type} digest of a candidate: {reason}")]
    HashCompute { hash_type: String, reason: String },

    #[cfg(feature = "wgpu")]
    #[error("A GPU-related error occured: {0}")]
    Gpu(String),

    #[error("No GPU adapter is available on this machine")]
    NoGpu,

    #[error(
        "Unable to access the file at the given path. Make sure the right permissions are available"
    )]
    Io(#[from] io::Error),
}
