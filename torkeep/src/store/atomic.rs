//! Temp-file-then-rename writes.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};

/// Suffix appended to a target path while it is being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Sibling path used while writing `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write `bytes` to `path` so that readers see either the old content or
/// the complete new content.
///
/// Parent directories are created as needed. The caller serialises writers
/// of the same path.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = temp_path_for(path);
    let write_failed = |source| StoreError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let result = File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(source) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_failed(source));
    }

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        write_failed(source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_appends_suffix() {
        let path = Path::new("/s/movie.torrent.resume_file");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/s/movie.torrent.resume_file.tmp")
        );
    }

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/state.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_write_atomic_into_directory_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();

        let err = write_atomic(&target, b"x").unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
        assert!(!temp_path_for(&target).exists());
    }
}
