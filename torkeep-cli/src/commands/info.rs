//! Info command - print the information report of a torrent.

use torkeep::descriptor::{Descriptor, Source};
use torkeep::registry::{DownloadId, RegistryError};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the info command.
///
/// `source` is a registered id or any `.torrent` path or magnet URI.
pub fn run(runner: &CliRunner, source: &str) -> Result<(), CliError> {
    runner.log_startup("info");
    let registry = runner.open_registry()?;

    let report = match registry.info(&DownloadId::new(source)) {
        Ok(report) => report,
        Err(RegistryError::NotFound(_)) => {
            Descriptor::open(Source::parse(source), registry.default_save_path())
                .map_err(RegistryError::from)?
                .report()
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", report);
    Ok(())
}
