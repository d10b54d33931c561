//! List command - show persisted downloads.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the list command.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("list");
    let registry = runner.open_registry()?;
    let entries = registry.entries();

    println!("Default save path: {}", registry.default_save_path().display());
    println!();

    if entries.is_empty() {
        println!("No downloads registered.");
        return Ok(());
    }

    println!("Downloads ({})", entries.len());
    println!("─────────────");
    for (id, save_path) in entries {
        println!("  {}", id);
        println!("    -> {}", save_path.display());
    }
    Ok(())
}
