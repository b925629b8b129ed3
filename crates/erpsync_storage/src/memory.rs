//! In-memory journal backend.

use crate::backend::JournalBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;

/// An in-memory journal.
///
/// Suitable for unit tests, integration tests and engines whose mapper
/// state does not need to outlive the process.
///
/// # Example
///
/// ```rust
/// use erpsync_storage::{JournalBackend, MemoryJournal};
///
/// let mut journal = MemoryJournal::new();
/// assert_eq!(journal.append(b"abc").unwrap(), 0);
/// assert_eq!(journal.append(b"de").unwrap(), 3);
/// assert_eq!(journal.size().unwrap(), 5);
/// ```
#[derive(Debug, Default)]
pub struct MemoryJournal {
    data: RwLock<Vec<u8>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal with pre-existing contents.
    ///
    /// Useful for testing replay and recovery.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the journal contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl JournalBackend for MemoryJournal {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.data.read().clone())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn rewrite(&mut self, bytes: &[u8]) -> StorageResult<()> {
        *self.data.write() = bytes.to_vec();
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }
}
