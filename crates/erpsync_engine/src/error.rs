//! Error types for the engine.

use erpsync_core::{MapperId, MappingError, StoreError, TombstoneId};
use erpsync_rpc::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for settings loading.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Errors surfaced to the engine's caller.
///
/// Mapping and remote failures never show up here: they are logged, turn
/// the affected mapper dirty and are counted in the
/// [`SyncReport`](crate::SyncReport).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Local bookkeeping could not be read or persisted.
    #[error("mapper store error: {0}")]
    Store(#[from] StoreError),

    /// The engine was built with invalid settings.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// The mapping table is invalid.
    #[error("invalid mapping: {0}")]
    Mapping(#[from] MappingError),

    /// No mapper with this id exists.
    #[error("unknown {0}")]
    UnknownMapper(MapperId),

    /// No tombstone with this id exists.
    #[error("unknown {0}")]
    UnknownTombstone(TombstoneId),

    /// The sync worker is no longer running.
    #[error("sync worker has stopped")]
    WorkerStopped,
}

/// Errors loading or validating [`SyncSettings`](crate::SyncSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The settings document is malformed.
    #[error("cannot parse settings: {0}")]
    Parse(String),

    /// A setting has an unusable value.
    #[error("setting '{field}' {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    /// Creates an invalid-value error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a single mapper or tombstone could not be synced.
///
/// Internal: converted into a dirty flag and a log line.
#[derive(Debug, Error)]
pub(crate) enum Failure {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Local(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Failure {
    pub(crate) fn local(message: impl Into<String>) -> Self {
        Self::Local(message.into())
    }
}
