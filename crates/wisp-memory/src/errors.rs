//! Memory store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors persisting a memory tier.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Reading or writing a tier file failed.
    #[error("memory file {path}: {source}")]
    Io {
        /// Tier file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A tier file is not `{"entries": [...]}`.
    #[error("memory file {path} is malformed: {source}")]
    Json {
        /// Tier file.
        path: PathBuf,
        /// The decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, MemoryError>;
