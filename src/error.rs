// SPDX-License-Identifier: MIT
//! Error types for container operations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while compressing or extracting a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Open/read/write/stat failure on a source, container or destination path
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Header count or an entry field could not be decoded
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Encoded entry record does not fit the fixed record width
    #[error("header record for '{name}' is {len} bytes, exceeding the record width")]
    RecordOverflow { name: String, len: usize },

    /// A compression or decompression stream failed mid-copy
    #[error("stream for entry '{name}' failed mid-copy: {source}")]
    PartialWrite {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Name cannot be represented in a text header record
    #[error("entry name cannot be encoded: {0:?}")]
    InvalidEntryName(String),

    /// Top-level source entry is not a regular file
    #[error("not a regular file: '{}'", .0.display())]
    UnsupportedEntry(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source directory is missing or lacks the trace marker log
    #[error("not a diagnostics trace directory: '{}'", .0.display())]
    NotATraceDirectory(PathBuf),

    /// Destination holds data that does not look like an old trace
    #[error("'{}' is not empty and does not look like an old trace location", .0.display())]
    TargetNotSafe(PathBuf),
}

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Attach the offending path to a raw I/O error.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
