//! Save-path command - change the default save directory.

use std::path::PathBuf;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the save-path command.
pub fn run(runner: &CliRunner, dir: PathBuf) -> Result<(), CliError> {
    runner.log_startup("save-path");
    let registry = runner.open_registry()?;
    let previous = registry.default_save_path();
    registry.set_default_save_path(&dir)?;

    println!("Default save path: {}", dir.display());
    println!("  (was {})", previous.display());
    Ok(())
}
