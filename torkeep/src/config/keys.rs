//! Addressing individual settings as `section.key`.

use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;
use super::file::{parse_positive, parse_value, ConfigFile};

/// One setting in `config.ini`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PathsDataFile,
    PathsTorrentDir,
    PathsSessionsDir,
    PathsSavePath,
    PathsLogDir,
    SupervisorPollIntervalMs,
    SupervisorCheckpointIntervalSecs,
    SupervisorCheckpointRetries,
    EngineLoopbackRateKbps,
    EngineMetadataDelayMs,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PathsDataFile,
            ConfigKey::PathsTorrentDir,
            ConfigKey::PathsSessionsDir,
            ConfigKey::PathsSavePath,
            ConfigKey::PathsLogDir,
            ConfigKey::SupervisorPollIntervalMs,
            ConfigKey::SupervisorCheckpointIntervalSecs,
            ConfigKey::SupervisorCheckpointRetries,
            ConfigKey::EngineLoopbackRateKbps,
            ConfigKey::EngineMetadataDelayMs,
        ]
    }

    pub fn section(self) -> &'static str {
        match self {
            ConfigKey::PathsDataFile
            | ConfigKey::PathsTorrentDir
            | ConfigKey::PathsSessionsDir
            | ConfigKey::PathsSavePath
            | ConfigKey::PathsLogDir => "paths",
            ConfigKey::SupervisorPollIntervalMs
            | ConfigKey::SupervisorCheckpointIntervalSecs
            | ConfigKey::SupervisorCheckpointRetries => "supervisor",
            ConfigKey::EngineLoopbackRateKbps | ConfigKey::EngineMetadataDelayMs => "engine",
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            ConfigKey::PathsDataFile => "data_file",
            ConfigKey::PathsTorrentDir => "torrent_dir",
            ConfigKey::PathsSessionsDir => "sessions_dir",
            ConfigKey::PathsSavePath => "save_path",
            ConfigKey::PathsLogDir => "log_dir",
            ConfigKey::SupervisorPollIntervalMs => "poll_interval_ms",
            ConfigKey::SupervisorCheckpointIntervalSecs => "checkpoint_interval_secs",
            ConfigKey::SupervisorCheckpointRetries => "checkpoint_retries",
            ConfigKey::EngineLoopbackRateKbps => "loopback_rate_kbps",
            ConfigKey::EngineMetadataDelayMs => "metadata_delay_ms",
        }
    }

    /// `section.key`
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    pub fn get(self, config: &ConfigFile) -> String {
        let path = |p: &PathBuf| p.display().to_string();
        match self {
            ConfigKey::PathsDataFile => path(&config.paths.data_file),
            ConfigKey::PathsTorrentDir => path(&config.paths.torrent_dir),
            ConfigKey::PathsSessionsDir => path(&config.paths.sessions_dir),
            ConfigKey::PathsSavePath => path(&config.paths.save_path),
            ConfigKey::PathsLogDir => path(&config.paths.log_dir),
            ConfigKey::SupervisorPollIntervalMs => config.supervisor.poll_interval_ms.to_string(),
            ConfigKey::SupervisorCheckpointIntervalSecs => {
                config.supervisor.checkpoint_interval_secs.to_string()
            }
            ConfigKey::SupervisorCheckpointRetries => {
                config.supervisor.checkpoint_retries.to_string()
            }
            ConfigKey::EngineLoopbackRateKbps => config.engine.loopback_rate_kbps.to_string(),
            ConfigKey::EngineMetadataDelayMs => config.engine.metadata_delay_ms.to_string(),
        }
    }

    /// Validate `value` and store it.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let (section, key) = (self.section(), self.key_name());
        let path = || -> Result<PathBuf, ConfigError> {
            match value.trim() {
                "" => Err(ConfigError::InvalidValue {
                    section: section.to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "path must not be empty".to_string(),
                }),
                v => Ok(PathBuf::from(v)),
            }
        };
        match self {
            ConfigKey::PathsDataFile => config.paths.data_file = path()?,
            ConfigKey::PathsTorrentDir => config.paths.torrent_dir = path()?,
            ConfigKey::PathsSessionsDir => config.paths.sessions_dir = path()?,
            ConfigKey::PathsSavePath => config.paths.save_path = path()?,
            ConfigKey::PathsLogDir => config.paths.log_dir = path()?,
            ConfigKey::SupervisorPollIntervalMs => {
                config.supervisor.poll_interval_ms = parse_positive(section, key, value)?
            }
            ConfigKey::SupervisorCheckpointIntervalSecs => {
                config.supervisor.checkpoint_interval_secs = parse_positive(section, key, value)?
            }
            ConfigKey::SupervisorCheckpointRetries => {
                config.supervisor.checkpoint_retries = parse_value(section, key, value)?
            }
            ConfigKey::EngineLoopbackRateKbps => {
                config.engine.loopback_rate_kbps = parse_positive(section, key, value)?
            }
            ConfigKey::EngineMetadataDelayMs => {
                config.engine.metadata_delay_ms = parse_value(section, key, value)?
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!("paths.nope".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_set_then_get() {
        let mut config = ConfigFile::default();
        ConfigKey::SupervisorCheckpointRetries
            .set(&mut config, "3")
            .unwrap();
        assert_eq!(ConfigKey::SupervisorCheckpointRetries.get(&config), "3");

        ConfigKey::PathsSavePath.set(&mut config, "/srv").unwrap();
        assert_eq!(config.paths.save_path, PathBuf::from("/srv"));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::EngineLoopbackRateKbps.set(&mut config, "0").is_err());
        assert!(ConfigKey::PathsLogDir.set(&mut config, "  ").is_err());
        assert!(ConfigKey::SupervisorCheckpointRetries
            .set(&mut config, "-1")
            .is_err());
        assert_eq!(config, ConfigFile::default());
    }
}
