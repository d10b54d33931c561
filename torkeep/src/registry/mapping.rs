//! The persisted download mapping.
//!
//! ```json
//! {
//!   "save_path": "/home/me/Downloads/saved_torrents",
//!   "torlinks": {
//!     "/home/me/.local/share/torkeep/tor_files/ubuntu.torrent": "/srv/iso"
//!   }
//! }
//! ```
//!
//! The whole file is loaded at start and rewritten on every change.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{RegistryError, RegistryResult};
use crate::store::write_atomic;

/// In-memory form of the registry file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Save directory used when a download is added without one.
    #[serde(default)]
    pub save_path: PathBuf,

    /// Download id (managed copy path or magnet URI) to save directory.
    #[serde(default)]
    pub torlinks: BTreeMap<String, PathBuf>,
}

impl RegistryFile {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            save_path: save_path.into(),
            torlinks: BTreeMap::new(),
        }
    }

    /// Load `path`, or start from `default_save_path` if it does not exist.
    ///
    /// An empty `save_path` in the file is replaced by the default.
    pub fn load(path: &Path, default_save_path: &Path) -> RegistryResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::new(default_save_path))
            }
            Err(source) => {
                return Err(RegistryError::ReadFailed {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut file: Self =
            serde_json::from_str(&text).map_err(|source| RegistryError::ParseFailed {
                path: path.to_path_buf(),
                source,
            })?;
        if file.save_path.as_os_str().is_empty() {
            file.save_path = default_save_path.to_path_buf();
        }
        Ok(file)
    }

    /// Rewrite `path` with the current mapping.
    pub fn save(&self, path: &Path) -> RegistryResult<()> {
        let json = serde_json::to_vec_pretty(self).map_err(RegistryError::SerializeFailed)?;
        write_atomic(path, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_default_save_path() {
        let dir = TempDir::new().unwrap();
        let file = RegistryFile::load(&dir.path().join("data.json"), Path::new("/dl")).unwrap();
        assert_eq!(file.save_path, PathBuf::from("/dl"));
        assert!(file.torlinks.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let mut file = RegistryFile::new("/dl");
        file.torlinks
            .insert("/m/a.torrent".to_string(), PathBuf::from("/srv"));
        file.save(&path).unwrap();

        let loaded = RegistryFile::load(&path, Path::new("/other")).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_empty_save_path_uses_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{"save_path":"","torlinks":{"tor_files/x.torrent":"/home/u/saved"}}"#,
        )
        .unwrap();

        let loaded = RegistryFile::load(&path, Path::new("/dl")).unwrap();
        assert_eq!(loaded.save_path, PathBuf::from("/dl"));
        assert_eq!(
            loaded.torlinks.get("tor_files/x.torrent"),
            Some(&PathBuf::from("/home/u/saved"))
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            RegistryFile::load(&path, Path::new("/dl")),
            Err(RegistryError::ParseFailed { .. })
        ));
    }
}
