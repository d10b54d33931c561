//! Process-wide logging setup.
//!
//! Logs go to stderr and, when a log directory is given, to a daily
//! rolling file `<log_dir>/torkeep.log.<date>`. `RUST_LOG` overrides the
//! default level.
//!
//! # Example
//!
//! ```ignore
//! let _guard = torkeep::logging::init_logging(Some(&config.paths.log_dir), verbose)?;
//! tracing::info!("started");
//! // keep `_guard` alive until exit so buffered file output is flushed
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};

/// Prefix of the rolling log files.
pub const LOG_FILE_NAME: &str = "torkeep.log";

/// Errors setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    #[error("a global logger is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the file writer alive. Dropping it flushes pending output.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn timer() -> OffsetTime<Rfc3339> {
    OffsetTime::local_rfc_3339().unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339))
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "torkeep=debug,info"
        } else {
            "info"
        })
    })
}

/// Install the global subscriber.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<LoggingGuard, LoggingError> {
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer())
        .with_target(false);

    let (file, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDirFailed {
                path: dir.to_path_buf(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritable_log_dir_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        let err = init_logging(Some(&blocker.join("logs")), false).err();
        assert!(matches!(err, Some(LoggingError::CreateDirFailed { .. })));
    }
}
