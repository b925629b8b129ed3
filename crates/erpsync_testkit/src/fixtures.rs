//! Store fixtures.

use erpsync_core::JournalMapperStore;
use erpsync_storage::FileJournal;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A journal file in a temporary directory, removed on drop.
pub struct TempJournal {
    dir: TempDir,
    path: PathBuf,
}

impl TempJournal {
    /// Creates an empty temporary directory for a journal.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("mappers").join("journal.esj");
        Self { dir, path }
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens (or reopens) a store over the journal file.
    ///
    /// The previous store must be dropped first: the file is locked while
    /// open.
    pub fn open(&self) -> JournalMapperStore<FileJournal> {
        let backend =
            FileJournal::open_with_create_dirs(&self.path).expect("Failed to open journal file");
        JournalMapperStore::open(backend).expect("Failed to replay journal")
    }
}

impl Default for TempJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use erpsync_core::{MapperKey, MapperStore, NewMapper};

    #[test]
    fn reopen_sees_previous_rows() {
        let journal = TempJournal::new();
        {
            let store = journal.open();
            store
                .insert(NewMapper::dirty(
                    MapperKey::new("Category", 1, "product.category", None),
                    Utc::now(),
                ))
                .unwrap();
        }
        assert!(journal.path().exists());
        assert_eq!(journal.open().mapper_count(), 1);
    }
}
