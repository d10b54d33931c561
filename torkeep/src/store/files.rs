//! Resume and session files under the sessions directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::atomic::{write_atomic, TEMP_SUFFIX};
use super::error::{StoreError, StoreResult};
use crate::descriptor::{Descriptor, InfoHash};
use crate::engine::{ResumeData, TransferEngine};

/// Suffix of per-download resume files.
pub const RESUME_SUFFIX: &str = ".resume_file";

/// File name of the process-wide session state.
pub const SESSION_FILE_NAME: &str = "engine.session";

/// Outcome of looking up resume data for a descriptor.
#[derive(Debug)]
pub enum ResumeLookup {
    /// No resume file exists.
    Absent,
    /// Resume data that belongs to the descriptor.
    Loaded(ResumeData),
    /// Resume data recorded for another download; ignored.
    Mismatch { found: InfoHash },
    /// The file exists but could not be read or decoded; ignored.
    Unreadable(String),
}

impl ResumeLookup {
    /// The resume data, if it may be trusted.
    pub fn into_resume(self) -> Option<ResumeData> {
        match self {
            ResumeLookup::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ResumeLookup::Loaded(_))
    }
}

/// Keyed access to resume and session files.
///
/// Writes to one path are serialised by a lock for that path only, so
/// downloads never contend with each other.
#[derive(Debug)]
pub struct StateFiles {
    sessions_dir: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl StateFiles {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Resume file for a download whose source is called `source_name`.
    pub fn resume_path(&self, source_name: &str) -> PathBuf {
        self.sessions_dir
            .join(format!("{}{}", source_name, RESUME_SUFFIX))
    }

    /// The single session state file.
    pub fn session_path(&self) -> PathBuf {
        self.sessions_dir.join(SESSION_FILE_NAME)
    }

    /// Create the sessions directory if it is missing.
    pub fn ensure_dir(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.sessions_dir).map_err(|source| StoreError::CreateDirFailed {
            path: self.sessions_dir.clone(),
            source,
        })
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Read a state file. Missing and empty files both yield `None`.
    pub fn read(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        let lock = self.lock_for(path);
        let _guard = lock.lock();
        match fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::ReadFailed {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Atomically replace a state file.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let lock = self.lock_for(path);
        let _guard = lock.lock();
        write_atomic(path, bytes)
    }

    /// Look up resume data for `descriptor`, trusting it only when its
    /// identity matches.
    pub fn load_resume(&self, descriptor: &Descriptor, engine: &dyn TransferEngine) -> ResumeLookup {
        let path = self.resume_path(&descriptor.source_name());
        let bytes = match self.read(&path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return ResumeLookup::Absent,
            Err(e) => return ResumeLookup::Unreadable(e.to_string()),
        };
        match engine.decode_resume(&bytes) {
            Ok(data) if data.info_hash == descriptor.info_hash() => ResumeLookup::Loaded(data),
            Ok(data) => ResumeLookup::Mismatch {
                found: data.info_hash,
            },
            Err(e) => ResumeLookup::Unreadable(e.to_string()),
        }
    }

    /// Persist resume data for `descriptor`. Returns the file written.
    pub fn save_resume(
        &self,
        descriptor: &Descriptor,
        engine: &dyn TransferEngine,
        data: &ResumeData,
    ) -> StoreResult<PathBuf> {
        let path = self.resume_path(&descriptor.source_name());
        if data.info_hash != descriptor.info_hash() {
            return Err(StoreError::IdentityMismatch {
                path,
                expected: descriptor.info_hash(),
                found: data.info_hash,
            });
        }
        let blob = engine.encode_resume(data);
        self.write(&path, &blob)?;
        debug!(path = %path.display(), bytes = blob.len(), "Wrote resume file");
        Ok(path)
    }

    pub fn load_session(&self) -> StoreResult<Option<Vec<u8>>> {
        self.read(&self.session_path())
    }

    pub fn save_session(&self, state: &[u8]) -> StoreResult<()> {
        self.write(&self.session_path(), state)
    }

    /// Remove temporary files left behind by an interrupted write.
    ///
    /// Only files last modified at least `min_age` ago are removed, so a
    /// write in flight in another process keeps its temp file. Returns how
    /// many were removed.
    pub fn sweep_temp_files(&self, min_age: Duration) -> usize {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMP_SUFFIX));
            if !is_temp {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok());
            if !age.is_some_and(|age| age >= min_age) {
                debug!(path = %path.display(), "Leaving recent temp file in place");
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale temp file"),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{fixtures, Metainfo, Source};
    use crate::engine::LoopbackEngine;
    use crate::store::temp_path_for;
    use tempfile::TempDir;

    fn descriptor() -> Descriptor {
        let meta = Metainfo::from_bytes(&fixtures::single_file_torrent("movie.mkv")).unwrap();
        Descriptor::from_metainfo(Source::parse("/t/movie.torrent"), meta, "/save")
    }

    #[test]
    fn test_keys_are_deterministic() {
        let files = StateFiles::new("/s");
        assert_eq!(
            files.resume_path("movie.torrent"),
            PathBuf::from("/s/movie.torrent.resume_file")
        );
        assert_eq!(files.session_path(), PathBuf::from("/s/engine.session"));
    }

    #[test]
    fn test_missing_and_empty_files_read_as_none() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        let path = files.session_path();
        assert!(files.read(&path).unwrap().is_none());

        fs::write(&path, b"").unwrap();
        assert!(files.read(&path).unwrap().is_none());
    }

    #[test]
    fn test_resume_round_trip() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        let engine = LoopbackEngine::default();
        let descriptor = descriptor();

        let mut data = ResumeData::new(descriptor.info_hash(), "movie.mkv", "/save")
            .with_num_pieces(2)
            .with_total_size(20_000);
        data.set_piece(0);
        let path = files.save_resume(&descriptor, &engine, &data).unwrap();
        assert!(path.ends_with("movie.torrent.resume_file"));

        match files.load_resume(&descriptor, &engine) {
            ResumeLookup::Loaded(loaded) => assert_eq!(loaded, data),
            other => panic!("expected loaded resume data, got {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_resume_is_not_trusted() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        let engine = LoopbackEngine::default();
        let descriptor = descriptor();

        let foreign = ResumeData::new(InfoHash::new([7; 20]), "other", "/save");
        assert!(matches!(
            files.save_resume(&descriptor, &engine, &foreign),
            Err(StoreError::IdentityMismatch { .. })
        ));

        files
            .write(&files.resume_path("movie.torrent"), &foreign.encode())
            .unwrap();
        let lookup = files.load_resume(&descriptor, &engine);
        assert!(matches!(lookup, ResumeLookup::Mismatch { .. }));
        assert!(lookup.into_resume().is_none());
    }

    #[test]
    fn test_garbage_resume_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        fs::write(files.resume_path("movie.torrent"), b"d4:junk").unwrap();

        let lookup = files.load_resume(&descriptor(), &LoopbackEngine::default());
        assert!(matches!(lookup, ResumeLookup::Unreadable(_)));
    }

    #[test]
    fn test_sweep_removes_only_temp_files() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        let keep = files.resume_path("a.torrent");
        fs::write(&keep, b"x").unwrap();
        fs::write(temp_path_for(&keep), b"partial").unwrap();

        assert_eq!(files.sweep_temp_files(Duration::ZERO), 1);
        assert!(keep.exists());
        assert!(!temp_path_for(&keep).exists());
    }

    #[test]
    fn test_sweep_leaves_recent_temp_files() {
        let dir = TempDir::new().unwrap();
        let files = StateFiles::new(dir.path());
        let fresh = temp_path_for(&files.session_path());
        let stale = temp_path_for(&files.resume_path("old.torrent"));
        fs::write(&fresh, b"in flight").unwrap();
        fs::write(&stale, b"abandoned").unwrap();
        let long_ago = SystemTime::now() - Duration::from_secs(3600);
        filetime::set_file_mtime(&stale, filetime::FileTime::from_system_time(long_ago)).unwrap();

        assert_eq!(files.sweep_temp_files(Duration::from_secs(60)), 1);
        assert!(fresh.exists());
        assert!(!stale.exists());
    }
}
