//! Error types for download descriptors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::bencode::BencodeError;

/// Result type for descriptor operations.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// A source that cannot be turned into a download.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The `.torrent` file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The file is not valid bencode.
    #[error("malformed torrent file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: BencodeError,
    },

    /// A required metainfo field is missing or has the wrong type.
    #[error("invalid torrent metadata: {0}")]
    InvalidMetainfo(String),

    /// The magnet URI is unusable.
    #[error("invalid magnet link: {0}")]
    InvalidMagnet(String),

    /// An info-hash string could not be decoded.
    #[error("invalid info hash: {0}")]
    InvalidInfoHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failed_display_names_path() {
        let err = DescriptorError::ReadFailed {
            path: PathBuf::from("/tmp/missing.torrent"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.torrent"));
        assert!(msg.contains("no such file"));
    }
}
