//! Configuration errors.

use std::io;
use std::path::PathBuf;

/// Errors loading, saving or editing `config.ini`.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    ReadFailed { path: PathBuf, reason: String },

    /// The file could not be written.
    WriteFailed { path: PathBuf, source: io::Error },

    /// A value has the wrong type or range.
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// `section.key` does not name a setting.
    UnknownKey(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, reason } => {
                write!(f, "failed to read {}: {}", path.display(), reason)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::InvalidValue {
                section,
                key,
                value,
                reason,
            } => write!(
                f,
                "invalid value '{}' for {}.{}: {}",
                value, section, key, reason
            ),
            Self::UnknownKey(key) => write!(f, "unknown configuration key '{}'", key),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
