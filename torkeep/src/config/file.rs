//! The `config.ini` model.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::error::ConfigError;
use crate::engine::LoopbackConfig;
use crate::registry::RegistryConfig;
use crate::supervisor::{
    SupervisorConfig, DEFAULT_CHECKPOINT_INTERVAL_SECS, DEFAULT_CHECKPOINT_RETRIES,
    DEFAULT_POLL_INTERVAL_MS,
};

/// File name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

const APP_DIR: &str = "torkeep";

/// Directory holding `config.ini`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default location of `config.ini`.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Directory holding the registry, managed torrents and session files.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_save_path() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("saved_torrents")
}

/// Parse one INI value, naming the setting on failure.
pub(super) fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub(super) fn parse_positive(section: &str, key: &str, value: &str) -> Result<u64, ConfigError> {
    match parse_value::<u64>(section, key, value)? {
        0 => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        n => Ok(n),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSettings {
    pub data_file: PathBuf,
    pub torrent_dir: PathBuf,
    pub sessions_dir: PathBuf,
    /// Default save directory for new downloads.
    pub save_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let data = data_dir();
        Self {
            data_file: data.join(crate::registry::DEFAULT_DATA_FILE),
            torrent_dir: data.join(crate::registry::DEFAULT_TORRENT_DIR),
            sessions_dir: data.join(crate::registry::DEFAULT_SESSIONS_DIR),
            save_path: default_save_path(),
            log_dir: data.join("logs"),
        }
    }
}

/// `[supervisor]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval_ms: u64,
    pub checkpoint_interval_secs: u64,
    pub checkpoint_retries: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            checkpoint_interval_secs: DEFAULT_CHECKPOINT_INTERVAL_SECS,
            checkpoint_retries: DEFAULT_CHECKPOINT_RETRIES,
        }
    }
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Simulated transfer rate of the loopback engine, in kB/s.
    pub loopback_rate_kbps: u64,
    pub metadata_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let loopback = LoopbackConfig::default();
        Self {
            loopback_rate_kbps: loopback.rate_bytes_per_sec / 1000,
            metadata_delay_ms: loopback.metadata_delay.as_millis() as u64,
        }
    }
}

// =============================================================================
// ConfigFile
// =============================================================================

/// Parsed `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub paths: PathSettings,
    pub supervisor: SupervisorSettings,
    pub engine: EngineSettings,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file is an error; callers that accept
    /// defaults use `unwrap_or_default()`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Build from parsed INI data; absent keys keep their defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("paths")) {
            let paths = &mut config.paths;
            for (key, slot) in [
                ("data_file", &mut paths.data_file),
                ("torrent_dir", &mut paths.torrent_dir),
                ("sessions_dir", &mut paths.sessions_dir),
                ("save_path", &mut paths.save_path),
                ("log_dir", &mut paths.log_dir),
            ] {
                if let Some(value) = section.get(key).map(str::trim).filter(|v| !v.is_empty()) {
                    *slot = PathBuf::from(value);
                }
            }
        }

        if let Some(section) = ini.section(Some("supervisor")) {
            if let Some(v) = section.get("poll_interval_ms") {
                config.supervisor.poll_interval_ms = parse_positive("supervisor", "poll_interval_ms", v)?;
            }
            if let Some(v) = section.get("checkpoint_interval_secs") {
                config.supervisor.checkpoint_interval_secs =
                    parse_positive("supervisor", "checkpoint_interval_secs", v)?;
            }
            if let Some(v) = section.get("checkpoint_retries") {
                config.supervisor.checkpoint_retries = parse_value("supervisor", "checkpoint_retries", v)?;
            }
        }

        if let Some(section) = ini.section(Some("engine")) {
            if let Some(v) = section.get("loopback_rate_kbps") {
                config.engine.loopback_rate_kbps = parse_positive("engine", "loopback_rate_kbps", v)?;
            }
            if let Some(v) = section.get("metadata_delay_ms") {
                config.engine.metadata_delay_ms = parse_value("engine", "metadata_delay_ms", v)?;
            }
        }

        Ok(config)
    }

    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("paths"))
            .set("data_file", self.paths.data_file.to_string_lossy())
            .set("torrent_dir", self.paths.torrent_dir.to_string_lossy())
            .set("sessions_dir", self.paths.sessions_dir.to_string_lossy())
            .set("save_path", self.paths.save_path.to_string_lossy())
            .set("log_dir", self.paths.log_dir.to_string_lossy());
        ini.with_section(Some("supervisor"))
            .set("poll_interval_ms", self.supervisor.poll_interval_ms.to_string())
            .set(
                "checkpoint_interval_secs",
                self.supervisor.checkpoint_interval_secs.to_string(),
            )
            .set("checkpoint_retries", self.supervisor.checkpoint_retries.to_string());
        ini.with_section(Some("engine"))
            .set("loopback_rate_kbps", self.engine.loopback_rate_kbps.to_string())
            .set("metadata_delay_ms", self.engine.metadata_delay_ms.to_string());
        ini
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_failed = |source| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }
        self.to_ini().write_to_file(path).map_err(write_failed)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_poll_interval(Duration::from_millis(self.supervisor.poll_interval_ms))
            .with_checkpoint_interval(Duration::from_secs(self.supervisor.checkpoint_interval_secs))
            .with_checkpoint_retries(self.supervisor.checkpoint_retries)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new(data_dir())
            .with_data_file(&self.paths.data_file)
            .with_torrent_dir(&self.paths.torrent_dir)
            .with_sessions_dir(&self.paths.sessions_dir)
            .with_default_save_path(&self.paths.save_path)
            .with_supervisor(self.supervisor_config())
    }

    pub fn loopback_config(&self) -> LoopbackConfig {
        LoopbackConfig::default()
            .with_rate(self.engine.loopback_rate_kbps.saturating_mul(1000))
            .with_metadata_delay(Duration::from_millis(self.engine.metadata_delay_ms))
    }
}
