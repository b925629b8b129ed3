//! Codec errors.

use thiserror::Error;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// A journal record could not be converted to or from CBOR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The record could not be serialized.
    #[error("cannot encode record: {0}")]
    Encode(String),

    /// The bytes do not hold a record of the expected shape.
    #[error("cannot decode record: {0}")]
    Decode(String),
}
