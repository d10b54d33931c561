//! Error types for the download registry.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::store::StoreError;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that fail a registry operation.
///
/// Per-download runtime failures never surface here; they stay inside
/// the supervisor that hit them.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The source could not be read or parsed; no download was created.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to read registry file {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("failed to parse registry file {}: {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize registry: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// No download with this id is known.
    #[error("unknown download: {0}")]
    NotFound(String),
}
