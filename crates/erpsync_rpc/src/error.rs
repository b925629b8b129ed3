//! Error types for remote calls.

use erpsync_core::RemoteId;
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A remote call failed.
///
/// Carries the model and object the call was about so the engine can log
/// a useful line without knowing which operation was attempted.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{model} ({}) could not be synced: {cause}", display_id(.id))]
pub struct RemoteError {
    /// Remote model name.
    pub model: String,
    /// Remote object id, if known.
    pub id: Option<RemoteId>,
    /// What went wrong.
    pub cause: RemoteCause,
}

fn display_id(id: &Option<RemoteId>) -> String {
    id.map_or_else(|| "no id".to_string(), |id| id.to_string())
}

/// Why a remote call failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteCause {
    /// The request did not reach the ERP or no response came back.
    #[error("transport error: {0}")]
    Transport(String),

    /// Login was refused.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The ERP answered with an error.
    #[error("remote fault: {0}")]
    Fault(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The referenced object does not exist.
    #[error("object does not exist")]
    NotFound,
}

impl RemoteError {
    /// Creates an error for `model` / `id`.
    pub fn new(model: impl Into<String>, id: Option<RemoteId>, cause: RemoteCause) -> Self {
        Self {
            model: model.into(),
            id,
            cause,
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected(
        model: impl Into<String>,
        id: Option<RemoteId>,
        what: impl Into<String>,
    ) -> Self {
        Self::new(model, id, RemoteCause::UnexpectedResponse(what.into()))
    }

    /// Creates a not-found error.
    pub fn not_found(model: impl Into<String>, id: RemoteId) -> Self {
        Self::new(model, Some(id), RemoteCause::NotFound)
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.cause, RemoteCause::Transport(_) | RemoteCause::Fault(_))
    }
}
