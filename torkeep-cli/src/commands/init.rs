//! Init command - write a default configuration file.

use std::path::Path;

use torkeep::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
///
/// An existing file is left untouched.
pub fn run(config_path: &Path) -> Result<(), CliError> {
    if config_path.exists() {
        println!("Configuration file already exists:");
        println!("  {}", config_path.display());
        println!();
        println!("Use 'torkeep config list' to review it.");
        return Ok(());
    }

    let config = ConfigFile::default();
    config.save_to(config_path)?;

    println!("Configuration file: {}", config_path.display());
    println!();
    println!("Downloads are saved to:  {}", config.paths.save_path.display());
    println!("Torrent files are kept in: {}", config.paths.torrent_dir.display());
    println!("Resume state is kept in:   {}", config.paths.sessions_dir.display());
    println!();
    println!("Edit this file to customize torkeep settings.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torkeep").join("config.ini");

        run(&path).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());

        std::fs::write(&path, "[supervisor]\ncheckpoint_retries = 4\n").unwrap();
        run(&path).unwrap();
        let kept = ConfigFile::load_from(&path).unwrap();
        assert_eq!(kept.supervisor.checkpoint_retries, 4);
    }
}
