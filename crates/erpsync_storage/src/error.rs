//! Error types for journal operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for journal operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a journal.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the journal lock.
    #[error("journal is locked by another writer: {}", path.display())]
    Locked {
        /// Path of the locked journal.
        path: PathBuf,
    },

    /// A frame failed validation.
    #[error("journal corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Stored checksum does not match the frame contents.
    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Byte offset of the offending frame.
        offset: u64,
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },

    /// A payload is too large to be framed.
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Payload length.
        len: usize,
        /// Maximum supported length.
        max: usize,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
