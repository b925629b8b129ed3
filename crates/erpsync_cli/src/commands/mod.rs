//! CLI command implementations.

pub mod check_config;
pub mod mappers;
pub mod stats;
pub mod tombstones;

use erpsync_core::JournalMapperStore;
use erpsync_storage::FileJournal;
use std::path::Path;

/// Errors surfaced by the CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The journal file does not exist.
    #[error("no journal found at {0}")]
    MissingJournal(String),

    /// The journal could not be opened or replayed.
    #[error(transparent)]
    Store(#[from] erpsync_core::StoreError),

    /// The journal file could not be locked or read.
    #[error(transparent)]
    Storage(#[from] erpsync_storage::StorageError),

    /// Settings failed to load or validate.
    #[error(transparent)]
    Settings(#[from] erpsync_engine::SettingsError),

    /// The mapping failed to load or validate.
    #[error(transparent)]
    Mapping(#[from] erpsync_core::MappingError),

    /// A mapping file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// JSON output failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Opens an existing journal.
pub fn open_store(path: &Path) -> Result<JournalMapperStore<FileJournal>, CliError> {
    if !path.exists() {
        return Err(CliError::MissingJournal(path.display().to_string()));
    }
    let backend = FileJournal::open(path)?;
    Ok(JournalMapperStore::open(backend)?)
}

/// Renders an optional id as text.
pub(crate) fn display_id<T: std::fmt::Display>(id: Option<T>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}
