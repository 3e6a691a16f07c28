use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Errors that can occur while building or driving a rotating writer.
#[derive(ThisError, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Initialization failed.
    #[error("Initialization error: {0}")]
    Init(String),
    /// Rendering a timestamp failed.
    #[error("Time error: {0}")]
    Time(#[from] time::error::Error),
    /// Compressing a rotated archive failed. The uncompressed archive is left in place.
    #[error("failed to compress {path}: {source}")]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
