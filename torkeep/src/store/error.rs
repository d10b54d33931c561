//! Error types for persisted state files.

use std::io;
use std::path::PathBuf;

use crate::descriptor::InfoHash;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reading or writing resume and session files.
#[derive(Debug)]
pub enum StoreError {
    /// Failed to create the sessions directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to read a state file that exists.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write or rename a state file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Resume data belongs to a different download.
    IdentityMismatch {
        path: PathBuf,
        expected: InfoHash,
        found: InfoHash,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::IdentityMismatch {
                path,
                expected,
                found,
            } => {
                write!(
                    f,
                    "resume data for {} belongs to {}, expected {}",
                    path.display(),
                    found,
                    expected
                )
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::IdentityMismatch { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_write_failed_chains_source() {
        let err = StoreError::WriteFailed {
            path: PathBuf::from("/x/y.resume_file"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to write /x/y.resume_file: denied");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_mismatch_display_names_both_hashes() {
        let err = StoreError::IdentityMismatch {
            path: PathBuf::from("a.resume_file"),
            expected: InfoHash::new([1; 20]),
            found: InfoHash::new([2; 20]),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"01".repeat(20)));
        assert!(msg.contains(&"02".repeat(20)));
    }
}
