//! Remove command - forget a persisted download.

use torkeep::registry::DownloadId;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the remove command.
///
/// The managed torrent copy and the downloaded data are kept.
pub fn run(runner: &CliRunner, id: &str) -> Result<(), CliError> {
    runner.log_startup("remove");
    let registry = runner.open_registry()?;
    registry.remove(&DownloadId::new(id))?;
    println!("Removed {}", id);
    Ok(())
}
