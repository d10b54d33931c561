//! Errors reported by transfer engines.

use thiserror::Error;

use super::types::{DownloadHandle, SubmissionId};

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by a [`TransferEngine`](super::TransferEngine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine refused the download.
    #[error("engine rejected download: {0}")]
    Rejected(String),

    /// The handle is not (or no longer) known to the engine.
    #[error("unknown download handle {0}")]
    UnknownHandle(DownloadHandle),

    /// The submission id is not known to the engine.
    #[error("unknown submission {0:?}")]
    UnknownSubmission(SubmissionId),

    /// A resume blob could not be decoded.
    #[error("invalid resume data: {0}")]
    InvalidResume(String),

    /// Session state could not be decoded.
    #[error("invalid session state: {0}")]
    InvalidSessionState(String),
}
