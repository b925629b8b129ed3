//! Journal backend trait definition.

use crate::error::StorageResult;

/// A low-level, append-only journal.
///
/// The mapper store appends one frame per mutation and replays the whole
/// journal when it opens. Backends never interpret the bytes.
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_all` returns every byte appended since the last `rewrite`
/// - `rewrite` atomically replaces the journal contents from the caller's
///   point of view (used by compaction)
/// - Backends must be `Send + Sync` so a store can be shared between threads
pub trait JournalBackend: Send + Sync {
    /// Returns the full contents of the journal.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the journal and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Replaces the whole journal with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be rewritten.
    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Makes all appended data durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the journal in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
