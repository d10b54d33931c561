//! Configuration file handling.
//!
//! Settings live in an INI file, by default
//! `<config_dir>/torkeep/config.ini`:
//!
//! ```ini
//! [paths]
//! data_file = /home/me/.local/share/torkeep/data.json
//! torrent_dir = /home/me/.local/share/torkeep/tor_files
//! sessions_dir = /home/me/.local/share/torkeep/sessions
//! save_path = /home/me/Downloads/saved_torrents
//! log_dir = /home/me/.local/share/torkeep/logs
//!
//! [supervisor]
//! poll_interval_ms = 200
//! checkpoint_interval_secs = 30
//! checkpoint_retries = 0
//!
//! [engine]
//! loopback_rate_kbps = 2000
//! metadata_delay_ms = 1000
//! ```
//!
//! Missing keys fall back to their defaults.

mod error;
mod file;
mod keys;

pub use error::ConfigError;
pub use file::{
    config_dir, config_file_path, data_dir, ConfigFile, EngineSettings, PathSettings,
    SupervisorSettings, CONFIG_FILE_NAME,
};
pub use keys::ConfigKey;
