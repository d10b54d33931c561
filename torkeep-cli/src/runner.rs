//! Shared setup for commands that touch downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use torkeep::config::ConfigFile;
use torkeep::engine::{LoopbackEngine, TransferEngine};
use torkeep::logging::{init_logging, LoggingGuard};
use torkeep::registry::Registry;
use tracing::{debug, info};

use crate::error::CliError;

/// Loaded configuration plus installed logging.
pub struct CliRunner {
    config: ConfigFile,
    config_path: PathBuf,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load `config_path` (defaults when the file does not exist) and
    /// install logging.
    pub fn new(config_path: &Path, verbose: bool) -> Result<Self, CliError> {
        let config = if config_path.exists() {
            ConfigFile::load_from(config_path)?
        } else {
            ConfigFile::default()
        };
        let logging = init_logging(Some(&config.paths.log_dir), verbose)?;
        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = torkeep::VERSION,
            command,
            config = %self.config_path.display(),
            "torkeep starting"
        );
        debug!(settings = ?self.config, "Effective configuration");
    }

    /// Open the registry on a loopback engine built from the settings.
    pub fn open_registry(&self) -> Result<Registry, CliError> {
        let engine: Arc<dyn TransferEngine> = LoopbackEngine::shared(self.config.loopback_config());
        Ok(Registry::open(self.config.registry_config(), engine)?)
    }
}
