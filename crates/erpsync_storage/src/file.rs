//! File-based journal backend.

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-backed journal.
///
/// Opening a journal takes an exclusive advisory lock on the file, so only
/// one engine can write a given journal at a time. The lock is released
/// when the journal is dropped.
///
/// # Durability
///
/// - `append` writes through to the OS
/// - `sync` calls `File::sync_all`
/// - `rewrite` truncates, writes and syncs in place
///
/// # Example
///
/// ```no_run
/// use erpsync_storage::{FileJournal, JournalBackend};
/// use std::path::Path;
///
/// let mut journal = FileJournal::open(Path::new("mappers.journal")).unwrap();
/// journal.append(b"frame").unwrap();
/// journal.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileJournal {
    /// Opens or creates a journal and locks it for writing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another writer holds the lock, or
    /// an I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Opens a journal, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the journal
    /// cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JournalBackend for FileJournal {
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(offset)
    }

    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }
}

impl Drop for FileJournal {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&*self.file.lock());
    }
}
