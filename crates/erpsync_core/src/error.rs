//! Error types for erpsync core.

use crate::types::{MapperId, TombstoneId};
use thiserror::Error;

/// Result type for field resolution and mapping configuration.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for mapper store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A field could not be mapped, or the mapping table itself is invalid.
///
/// Mapping errors are local: they never reach the ERP. During a sync they
/// abort the payload of the remote model being mapped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// Resolving a single field failed.
    #[error("an error occurred while mapping field '{field}': {reason}")]
    Field {
        /// Remote field name.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// An attribute path is malformed.
    #[error("invalid attribute path '{path}': {reason}")]
    InvalidPath {
        /// The offending path text.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The mapping table violates a structural rule.
    #[error("invalid mapping configuration: {0}")]
    InvalidConfig(String),

    /// The mapping table could not be parsed.
    #[error("failed to parse mapping configuration: {0}")]
    Parse(String),
}

impl MappingError {
    /// Creates a field error.
    pub fn field(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Field {
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a mapper store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Journal backend error.
    #[error("storage error: {0}")]
    Storage(#[from] erpsync_storage::StorageError),

    /// Journal record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] erpsync_codec::CodecError),

    /// A mapper for the same key already exists.
    #[error("a mapper for {kind}#{local_id} -> {model} already exists ({existing})")]
    DuplicateMapper {
        /// Local entity kind.
        kind: String,
        /// Local object id.
        local_id: u64,
        /// Remote model name.
        model: String,
        /// The row that already holds the key.
        existing: MapperId,
    },

    /// The referenced mapper does not exist.
    #[error("{0} not found")]
    MapperNotFound(MapperId),

    /// The referenced tombstone does not exist.
    #[error("{0} not found")]
    TombstoneNotFound(TombstoneId),

    /// The parent named by a new mapper does not exist.
    #[error("parent {0} does not exist")]
    MissingParent(MapperId),
}
