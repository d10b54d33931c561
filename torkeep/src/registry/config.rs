//! Registry locations.

use std::path::{Path, PathBuf};

use crate::supervisor::SupervisorConfig;

/// Default name of the registry file.
pub const DEFAULT_DATA_FILE: &str = "data.json";

/// Default name of the managed torrent directory.
pub const DEFAULT_TORRENT_DIR: &str = "tor_files";

/// Default name of the resume/session directory.
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";

/// Where the registry keeps its files, and how it runs supervisors.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// JSON mapping of download ids to save directories.
    pub data_file: PathBuf,

    /// Managed copies of added `.torrent` files.
    pub torrent_dir: PathBuf,

    /// Resume files and the session file.
    pub sessions_dir: PathBuf,

    /// Save directory used until the registry file records one.
    pub default_save_path: PathBuf,

    pub supervisor: SupervisorConfig,
}

impl RegistryConfig {
    /// Lay every location out under `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        Self {
            data_file: base.join(DEFAULT_DATA_FILE),
            torrent_dir: base.join(DEFAULT_TORRENT_DIR),
            sessions_dir: base.join(DEFAULT_SESSIONS_DIR),
            default_save_path: base.join("saved_torrents"),
            supervisor: SupervisorConfig::default(),
        }
    }

    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = path.into();
        self
    }

    pub fn with_torrent_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.torrent_dir = path.into();
        self
    }

    pub fn with_sessions_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sessions_dir = path.into();
        self
    }

    pub fn with_default_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_save_path = path.into();
        self
    }

    pub fn with_supervisor(mut self, supervisor: SupervisorConfig) -> Self {
        self.supervisor = supervisor;
        self
    }
}
