//! Terminal error types.
//!
//! Every failure of a file command maps to one variant. None of them is
//! fatal: the command interpreter turns each into feedback for the model.

use std::io;

use thiserror::Error;

/// Errors from sandbox file operations.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// Name does not match the filename pattern or escapes the sandbox.
    #[error("invalid file name: {name}")]
    InvalidName {
        /// Name as written by the model.
        name: String,
    },

    /// File does not exist.
    #[error("file not found: {name}")]
    NotFound {
        /// Target file.
        name: String,
    },

    /// Entry number not present in the file.
    #[error("entry {entry} not found in {name}")]
    EntryNotFound {
        /// Target file.
        name: String,
        /// Requested entry.
        entry: u64,
    },

    /// Appending would push the file past its character cap.
    #[error("{name} would exceed {limit} characters")]
    Capacity {
        /// Target file.
        name: String,
        /// Character cap.
        limit: usize,
        /// File content as stored, returned so the model can choose what to delete.
        content: String,
    },

    /// Extension is not in the allowed list.
    #[error("extension of {name} not allowed (allowed: {})", allowed.join(", "))]
    InvalidExtension {
        /// Requested file.
        name: String,
        /// Allowed extensions, dot included.
        allowed: Vec<String>,
    },

    /// The sandbox already holds the maximum number of files.
    #[error("file limit of {limit} reached")]
    FileLimit {
        /// Requested file.
        name: String,
        /// Maximum number of files.
        limit: usize,
        /// Current listing.
        files: Vec<String>,
    },

    /// File already exists.
    #[error("file already exists: {name}")]
    AlreadyExists {
        /// Requested file.
        name: String,
    },

    /// Underlying filesystem failure.
    #[error("io error on {name}: {source}")]
    Io {
        /// File being operated on.
        name: String,
        /// The I/O error.
        #[source]
        source: io::Error,
    },
}

impl TerminalError {
    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            source,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TerminalError>;
